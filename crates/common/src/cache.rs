//! Key/value cache adapter.
//!
//! The cache is optional everywhere it is used: callers hold an
//! `Option<SharedCache>` and treat `None` or any [`CacheError`] as a miss.
//!
//! Two backends are provided:
//!
//! - [`RedisCache`]: Redis via `fred`, used in deployments
//! - [`MemoryCache`]: process-local map, used in tests

use async_trait::async_trait;
use fred::clients::Client as RedisClient;
use fred::interfaces::{ClientLike, KeysInterface};
use fred::types::{Expiration, Key};
use futures::TryStreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Keys deleted per `DEL` round trip during prefix invalidation.
const DELETE_BATCH_SIZE: usize = 256;

/// `SCAN` page size hint.
const SCAN_COUNT: u32 = 100;

/// Cache error type.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Redis operation failed.
    #[error("Redis error: {0}")]
    Redis(String),

    /// A stored value could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<fred::error::Error> for CacheError {
    fn from(err: fred::error::Error) -> Self {
        Self::Redis(err.to_string())
    }
}

/// Key/value store with TTL and prefix deletion.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Check whether `key` exists.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Delete exactly `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Delete every key starting with `prefix`. Returns the number of keys removed.
    ///
    /// The prefix is matched literally.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;

    /// Atomically increment the counter at `key`, creating it at zero, and
    /// return the new value. Counters never expire.
    async fn incr(&self, key: &str) -> Result<u64, CacheError>;
}

/// Escape Redis glob metacharacters so `prefix` matches itself only.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Shared cache handle.
pub type SharedCache = Arc<dyn CacheStore>;

/// Redis-backed cache.
#[derive(Clone)]
pub struct RedisCache {
    redis: Arc<RedisClient>,
}

impl RedisCache {
    /// Create a new Redis cache from a connected client.
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }

    /// Connect to Redis at `url`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let config = fred::types::config::Config::from_url(url)?;
        let client = RedisClient::new(config, None, None, None);
        client.connect();
        client.wait_for_connect().await?;
        Ok(Self::new(Arc::new(client)))
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.redis.get::<Option<String>, _>(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.redis
            .set::<(), _, _>(
                key,
                value,
                Some(Expiration::EX(ttl.as_secs().max(1) as i64)),
                None,
                false,
            )
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let count: i64 = self.redis.exists(key).await?;
        Ok(count > 0)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let removed: i64 = self.redis.del(key).await?;
        Ok(removed > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let pattern = format!("{}*", escape_glob(prefix));
        let keys: Vec<Key> = self
            .redis
            .scan_buffered(pattern, Some(SCAN_COUNT), None)
            .try_collect()
            .await?;

        let mut deleted = 0_u64;
        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            let removed: i64 = self.redis.del(batch.to_vec()).await?;
            deleted += removed.max(0) as u64;
        }

        debug!(prefix = %prefix, deleted, "Deleted cache keys by prefix");
        Ok(deleted)
    }

    async fn incr(&self, key: &str) -> Result<u64, CacheError> {
        let value: i64 = self.redis.incr(key).await?;
        Ok(value.max(0) as u64)
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    /// `None` for counters.
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// Whether the cache holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn incr(&self, key: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let current = match entries.get(key).filter(|entry| entry.is_live(now)) {
            Some(entry) => entry.value.parse::<u64>().map_err(|e| {
                CacheError::Serialization(format!("value at {key} is not a counter: {e}"))
            })?,
            None => 0,
        };

        let next = current + 1;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: next.to_string(),
                expires_at: None,
            },
        );
        Ok(next)
    }
}
