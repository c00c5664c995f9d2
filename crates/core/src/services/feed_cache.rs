//! Feed cache coordination.
//!
//! Feeds are cached per viewer under
//! `<prefix>:feed:<viewer_id>:<global_gen>:<viewer_gen>`. The two generation
//! counters live under `<prefix>:feedgen` and `<prefix>:feedgen:<viewer_id>`.
//!
//! A read takes its [`FeedKey`] before querying the store. A write bumps the
//! matching counter after its transaction commits, so every later read asks
//! for a new key. A snapshot computed before the write can still be stored,
//! but only under a key nobody reads again; it expires with its TTL.
//!
//! The cache never fails a caller. A missing cache makes every operation a
//! no-op, and cache errors are logged and treated as misses.

use std::fmt;
use std::time::Duration;

use sosmed_common::{CacheError, Config, RetryPolicy, SharedCache};
use sosmed_db::repositories::FeedEntry;
use tracing::{debug, warn};

/// Default key prefix when Redis is configured without one.
const DEFAULT_PREFIX: &str = "sosmed";

/// Cache key of one viewer's feed, stamped with the generations current when
/// it was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedKey(String);

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache-aside coordinator for viewer feeds.
#[derive(Clone)]
pub struct FeedCache {
    cache: Option<SharedCache>,
    prefix: String,
    ttl: Duration,
    retry: RetryPolicy,
}

impl FeedCache {
    /// Create a feed cache.
    #[must_use]
    pub fn new(
        cache: Option<SharedCache>,
        prefix: impl Into<String>,
        ttl: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
            ttl,
            retry,
        }
    }

    /// Build a feed cache from application configuration.
    #[must_use]
    pub fn from_config(cache: Option<SharedCache>, config: &Config) -> Self {
        let prefix = config
            .redis
            .as_ref()
            .map_or(DEFAULT_PREFIX, |redis| redis.prefix.as_str());

        Self::new(
            cache,
            prefix,
            config.feed.cache_ttl(),
            RetryPolicy::from_config(&config.cache),
        )
    }

    /// A feed cache that never caches.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_PREFIX, Duration::ZERO, RetryPolicy::none())
    }

    /// Prefix shared by every cached feed.
    #[must_use]
    pub fn feed_prefix(&self) -> String {
        format!("{}:feed:", self.prefix)
    }

    fn global_generation_key(&self) -> String {
        format!("{}:feedgen", self.prefix)
    }

    fn viewer_generation_key(&self, viewer_id: &str) -> String {
        format!("{}:feedgen:{viewer_id}", self.prefix)
    }

    fn stamped_key(&self, viewer_id: &str, global: u64, viewer: u64) -> FeedKey {
        FeedKey(format!("{}{viewer_id}:{global}:{viewer}", self.feed_prefix()))
    }

    /// Current key for a viewer's feed.
    ///
    /// Take it before reading the store. `None` when there is no cache or the
    /// generations cannot be read; the caller then skips the cache entirely.
    pub async fn key_for(&self, viewer_id: &str) -> Option<FeedKey> {
        let cache = self.cache.as_ref()?;

        let generations = async {
            let global = read_generation(cache, &self.global_generation_key()).await?;
            let viewer = read_generation(cache, &self.viewer_generation_key(viewer_id)).await?;
            Ok::<_, CacheError>((global, viewer))
        };

        match generations.await {
            Ok((global, viewer)) => Some(self.stamped_key(viewer_id, global, viewer)),
            Err(e) => {
                warn!(error = %e, viewer_id = %viewer_id, "Feed generation read failed");
                None
            }
        }
    }

    /// Cached feed under `key`, if present and non-empty.
    pub async fn load(&self, key: &FeedKey) -> Option<Vec<FeedEntry>> {
        let cache = self.cache.as_ref()?;

        let raw = match cache.get(&key.0).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "Feed cache miss");
                return None;
            }
            Err(e) => {
                warn!(error = %e, key = %key, "Feed cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<Vec<FeedEntry>>(&raw) {
            Ok(entries) if !entries.is_empty() => {
                debug!(key = %key, count = entries.len(), "Feed cache hit");
                Some(entries)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, key = %key, "Discarding undecodable cached feed");
                None
            }
        }
    }

    /// Cache a computed feed under `key`. Empty feeds are never cached.
    pub async fn store(&self, key: &FeedKey, entries: &[FeedEntry]) {
        let Some(cache) = &self.cache else {
            return;
        };
        if entries.is_empty() {
            return;
        }

        let raw = match serde_json::to_string(entries) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, key = %key, "Failed to encode feed for cache");
                return;
            }
        };

        if let Err(e) = cache.set(&key.0, &raw, self.ttl).await {
            warn!(error = %e, key = %key, "Feed cache write failed");
        }
    }

    /// Invalidate every cached feed.
    ///
    /// Used after writes that can appear in any follower's feed: new posts,
    /// likes, unlikes and comments. Runs after commit and is awaited, so a
    /// read issued after the write returns cannot see the old feed unless
    /// every retry failed. Failures are logged and never returned.
    pub async fn invalidate_all(&self) {
        let Some(cache) = &self.cache else {
            return;
        };

        self.bump_with_retry(cache, &self.global_generation_key()).await;

        // Old generations are unreachable; this only frees memory early.
        let prefix = self.feed_prefix();
        match cache.delete_prefix(&prefix).await {
            Ok(deleted) => debug!(prefix = %prefix, deleted, "Dropped cached feeds"),
            Err(e) => debug!(error = %e, prefix = %prefix, "Cached feed cleanup failed"),
        }
    }

    /// Invalidate one viewer's cached feed, after their follow set changed.
    pub async fn invalidate_viewer(&self, viewer_id: &str) {
        let Some(cache) = &self.cache else {
            return;
        };

        let Some(viewer_gen) = self
            .bump_with_retry(cache, &self.viewer_generation_key(viewer_id))
            .await
        else {
            return;
        };

        let Ok(global) = read_generation(cache, &self.global_generation_key()).await else {
            return;
        };
        let stale = self.stamped_key(viewer_id, global, viewer_gen.saturating_sub(1));
        if let Err(e) = cache.delete(&stale.0).await {
            debug!(error = %e, key = %stale, "Cached feed cleanup failed");
        }
    }

    async fn bump_with_retry(&self, cache: &SharedCache, counter: &str) -> Option<u64> {
        let mut attempt = 0;
        loop {
            match cache.incr(counter).await {
                Ok(generation) => {
                    debug!(counter = %counter, generation, "Invalidated feed cache");
                    return Some(generation);
                }
                Err(e) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(
                        error = %e,
                        counter = %counter,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying feed cache invalidation"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        counter = %counter,
                        attempts = attempt + 1,
                        "Feed cache invalidation failed"
                    );
                    return None;
                }
            }
        }
    }
}

async fn read_generation(cache: &SharedCache, counter: &str) -> Result<u64, CacheError> {
    match cache.get(counter).await? {
        Some(raw) => raw.parse().map_err(|e| {
            CacheError::Serialization(format!("generation at {counter} is not a number: {e}"))
        }),
        None => Ok(0),
    }
}
