//! Post service: posts, likes and comments.
//!
//! Every write here can change what followers see, so each successful write
//! drops all cached feeds after its transaction commits.

use crate::services::feed_cache::FeedCache;
use sosmed_common::{AppError, AppResult, Identity};
use sosmed_db::{
    entities::{comment, post, post_like},
    repositories::PostRepository,
};
use validator::Validate;

/// Input for creating a post.
#[derive(Debug, Clone, Validate)]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    pub image_path: Option<String>,
}

/// Input for adding a comment.
#[derive(Debug, Clone, Validate)]
pub struct AddCommentInput {
    pub post_id: String,
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    feed_cache: FeedCache,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(post_repo: PostRepository, feed_cache: FeedCache) -> Self {
        Self {
            post_repo,
            feed_cache,
        }
    }

    /// Create a post authored by the caller.
    pub async fn create_post(
        &self,
        identity: &Identity,
        input: CreatePostInput,
    ) -> AppResult<post::Model> {
        input.validate()?;

        let post = self
            .post_repo
            .create_post(
                identity.user_id(),
                &input.content,
                input.image_path.as_deref(),
            )
            .await?;

        tracing::info!(post_id = %post.id, user_id = %post.user_id, "Created post");

        self.feed_cache.invalidate_all().await;
        Ok(post)
    }

    /// Author of a live post.
    pub async fn get_post_owner(&self, post_id: &str) -> AppResult<String> {
        self.post_repo.get_owner(post_id).await
    }

    /// Like a post as the caller.
    pub async fn like_post(
        &self,
        identity: &Identity,
        post_id: &str,
    ) -> AppResult<post_like::Model> {
        let owner_id = self.post_repo.get_owner(post_id).await?;
        let like = self
            .post_repo
            .like_post(post_id, identity.user_id(), &owner_id)
            .await?;

        self.feed_cache.invalidate_all().await;
        Ok(like)
    }

    /// Remove the caller's like from a post.
    pub async fn unlike_post(&self, identity: &Identity, post_id: &str) -> AppResult<()> {
        self.post_repo
            .unlike_post(post_id, identity.user_id())
            .await?;

        self.feed_cache.invalidate_all().await;
        Ok(())
    }

    /// Comment on a post as the caller.
    pub async fn add_comment(
        &self,
        identity: &Identity,
        input: AddCommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;

        let content = input.content.trim();
        if content.is_empty() {
            return Err(AppError::InvalidArgument(
                "comment must not be blank".to_string(),
            ));
        }

        let owner_id = self.post_repo.get_owner(&input.post_id).await?;
        let comment = self
            .post_repo
            .add_comment(&input.post_id, identity.user_id(), content, &owner_id)
            .await?;

        self.feed_cache.invalidate_all().await;
        Ok(comment)
    }
}
