//! Authenticated caller identity.
//!
//! Token issuance and validation live outside this workspace. Whatever
//! validates a bearer token produces an [`Identity`] once and hands it to
//! every core operation explicitly.

use crate::cache::SharedCache;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Namespace for revoked bearer tokens.
const BLACKLIST_PREFIX: &str = "blacklist:";

/// A validated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    user_id: String,
}

impl Identity {
    /// Wrap a user ID that the token validator has already verified.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// The caller's user ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Revoked-token lookup backed by the cache.
#[derive(Clone, Default)]
pub struct TokenRevocations {
    cache: Option<SharedCache>,
}

impl TokenRevocations {
    /// Create a lookup. Without a cache no token is considered revoked.
    #[must_use]
    pub const fn new(cache: Option<SharedCache>) -> Self {
        Self { cache }
    }

    /// Cache key for a revoked token.
    #[must_use]
    pub fn key(token: &str) -> String {
        format!("{BLACKLIST_PREFIX}{token}")
    }

    /// Check whether `token` has been revoked.
    ///
    /// A cache failure is returned to the validator, which must reject the token.
    pub async fn is_revoked(&self, token: &str) -> AppResult<bool> {
        let Some(cache) = &self.cache else {
            return Ok(false);
        };

        cache
            .exists(&Self::key(token))
            .await
            .map_err(AppError::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryCache};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_identity() {
        let identity = Identity::new("01hzzzzzzzzzzzzzzzzzzzzzzz");
        assert_eq!(identity.user_id(), "01hzzzzzzzzzzzzzzzzzzzzzzz");
    }

    #[tokio::test]
    async fn test_revoked_token() {
        let cache = MemoryCache::new();
        cache
            .set("blacklist:abc", "1", Duration::from_secs(60))
            .await
            .unwrap();

        let revocations = TokenRevocations::new(Some(Arc::new(cache)));

        assert!(revocations.is_revoked("abc").await.unwrap());
        assert!(!revocations.is_revoked("def").await.unwrap());
    }

    #[tokio::test]
    async fn test_no_cache_means_not_revoked() {
        let revocations = TokenRevocations::new(None);
        assert!(!revocations.is_revoked("abc").await.unwrap());
    }
}
