//! Business logic services.

#![allow(missing_docs)]

pub mod feed;
pub mod feed_cache;
pub mod following;
pub mod notification;
pub mod post;
pub mod user;

pub use feed::{CACHED_FEED_MESSAGE, EMPTY_FEED_MESSAGE, FeedPage, FeedService, FeedSource};
pub use feed_cache::{FeedCache, FeedKey};
pub use following::FollowingService;
pub use notification::{NOTIFICATION_PAGE_SIZE, NotificationPage, NotificationService};
pub use post::{AddCommentInput, CreatePostInput, PostService};
pub use user::{CreateUserInput, UserService};
