//! Service wiring.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use sosmed_common::{Config, SharedCache, TokenRevocations};
use sosmed_core::{
    FeedCache, FeedService, FollowingService, NotificationService, PostService, UserService,
};
use sosmed_db::repositories::{
    FeedRepository, FollowingRepository, NotificationRepository, PostRepository, UserRepository,
};

/// Every service the process hosts, sharing one pool and one cache.
#[derive(Clone)]
pub struct AppState {
    /// Account records.
    pub users: UserService,
    /// Posts, likes and comments.
    pub posts: PostService,
    /// Follow graph.
    pub following: FollowingService,
    /// Cached home feed.
    pub feed: FeedService,
    /// Notification inbox.
    pub notifications: NotificationService,
    /// Revoked-token lookup for the token validator.
    pub revocations: TokenRevocations,
}

impl AppState {
    /// Build all services over `db` and the optional `cache`.
    pub fn new(db: Arc<DatabaseConnection>, cache: Option<SharedCache>, config: &Config) -> Self {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let post_repo = PostRepository::new(Arc::clone(&db));
        let following_repo = FollowingRepository::new(Arc::clone(&db));
        let feed_repo = FeedRepository::new(Arc::clone(&db));
        let notification_repo = NotificationRepository::new(Arc::clone(&db));

        let feed_cache = FeedCache::from_config(cache.clone(), config);

        Self {
            users: UserService::new(user_repo),
            posts: PostService::new(post_repo, feed_cache.clone()),
            following: FollowingService::new(following_repo, feed_cache.clone()),
            feed: FeedService::new(feed_repo, feed_cache, config.feed.page_size),
            notifications: NotificationService::new(notification_repo),
            revocations: TokenRevocations::new(cache),
        }
    }
}
