//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration. Absent means the feed is served without a cache.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Feed configuration.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Cache behaviour configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Maximum number of posts in one feed page.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Seconds a computed feed stays cached.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// Cache behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Retries for a failed feed invalidation before giving up.
    #[serde(default = "default_invalidation_retries")]
    pub invalidation_retries: u32,
    /// Delay before the first invalidation retry, in milliseconds.
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl FeedConfig {
    /// Cache TTL as a [`Duration`].
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            invalidation_retries: default_invalidation_retries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
        }
    }
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_acquire_timeout_secs() -> u64 {
    10
}

fn default_redis_prefix() -> String {
    "sosmed".to_string()
}

const fn default_page_size() -> u64 {
    10
}

const fn default_cache_ttl_secs() -> u64 {
    60
}

const fn default_invalidation_retries() -> u32 {
    3
}

const fn default_retry_initial_delay_ms() -> u64 {
    50
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `SOSMED_ENV`)
    /// 4. Environment variables with `SOSMED__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("SOSMED_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SOSMED")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("SOSMED")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_without_redis() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/sosmed"
            "#,
        );

        assert!(config.redis.is_none());
        assert_eq!(config.feed.page_size, 10);
        assert_eq!(config.feed.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.cache.invalidation_retries, 3);
        assert_eq!(config.database.max_connections, 20);
    }

    #[test]
    fn test_redis_section() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/sosmed"

            [redis]
            url = "redis://localhost:6379"

            [feed]
            cache_ttl_secs = 30
            "#,
        );

        let redis = config.redis.unwrap();
        assert_eq!(redis.prefix, "sosmed");
        assert_eq!(config.feed.cache_ttl_secs, 30);
        assert_eq!(config.feed.page_size, 10);
    }
}
