//! Following service.

use crate::services::feed_cache::FeedCache;
use sosmed_common::{AppResult, Identity};
use sosmed_db::{entities::following, repositories::FollowingRepository};

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    following_repo: FollowingRepository,
    feed_cache: FeedCache,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(following_repo: FollowingRepository, feed_cache: FeedCache) -> Self {
        Self {
            following_repo,
            feed_cache,
        }
    }

    /// Follow a user as the caller.
    pub async fn follow(
        &self,
        identity: &Identity,
        followee_id: &str,
    ) -> AppResult<following::Model> {
        let edge = self
            .following_repo
            .follow(identity.user_id(), followee_id)
            .await?;

        tracing::info!(
            follower_id = %edge.follower_id,
            followee_id = %edge.followee_id,
            "Followed user"
        );

        self.feed_cache.invalidate_viewer(identity.user_id()).await;
        Ok(edge)
    }

    /// Stop following a user.
    pub async fn unfollow(&self, identity: &Identity, followee_id: &str) -> AppResult<()> {
        self.following_repo
            .unfollow(identity.user_id(), followee_id)
            .await?;

        tracing::info!(
            follower_id = %identity.user_id(),
            followee_id = %followee_id,
            "Unfollowed user"
        );

        self.feed_cache.invalidate_viewer(identity.user_id()).await;
        Ok(())
    }

    /// Whether the caller follows `followee_id`.
    pub async fn is_following(&self, identity: &Identity, followee_id: &str) -> AppResult<bool> {
        self.following_repo
            .is_following(identity.user_id(), followee_id)
            .await
    }
}
