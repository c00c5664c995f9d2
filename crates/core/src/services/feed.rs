//! Feed service.

use crate::services::feed_cache::FeedCache;
use serde::Serialize;
use sosmed_common::{AppResult, Identity};
use sosmed_db::repositories::{FeedEntry, FeedRepository};

/// Message for a feed with no visible posts.
pub const EMPTY_FEED_MESSAGE: &str = "No posts found. Follow some users to see their posts.";

/// Message for a feed served from the cache.
pub const CACHED_FEED_MESSAGE: &str = "data from cache";

/// Where a feed page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Cache,
    Store,
}

/// One page of a viewer's feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,
    pub source: FeedSource,
}

impl FeedPage {
    /// User-facing message for this page, if any.
    #[must_use]
    pub fn message(&self) -> Option<&'static str> {
        if self.entries.is_empty() {
            Some(EMPTY_FEED_MESSAGE)
        } else if self.source == FeedSource::Cache {
            Some(CACHED_FEED_MESSAGE)
        } else {
            None
        }
    }

    /// Whether the feed has no posts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Feed service for business logic.
#[derive(Clone)]
pub struct FeedService {
    feed_repo: FeedRepository,
    feed_cache: FeedCache,
    page_size: u64,
}

impl FeedService {
    /// Create a new feed service.
    #[must_use]
    pub const fn new(feed_repo: FeedRepository, feed_cache: FeedCache, page_size: u64) -> Self {
        Self {
            feed_repo,
            feed_cache,
            page_size,
        }
    }

    /// The caller's feed: newest posts by the authors they follow.
    pub async fn get_feed(&self, identity: &Identity) -> AppResult<FeedPage> {
        let viewer_id = identity.user_id();

        // Taken before the store read, so a write committing meanwhile moves
        // later reads to a fresh key.
        let key = self.feed_cache.key_for(viewer_id).await;

        if let Some(key) = &key {
            if let Some(entries) = self.feed_cache.load(key).await {
                return Ok(FeedPage {
                    entries,
                    source: FeedSource::Cache,
                });
            }
        }

        let entries = self.feed_repo.get_feed(viewer_id, self.page_size).await?;
        if let Some(key) = &key {
            self.feed_cache.store(key, &entries).await;
        }

        tracing::debug!(user_id = %viewer_id, count = entries.len(), "Composed feed");

        Ok(FeedPage {
            entries,
            source: FeedSource::Store,
        })
    }
}
