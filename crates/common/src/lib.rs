//! Common utilities and shared types for sosmed-rs.
//!
//! This crate provides foundational components used across all sosmed-rs crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Identity**: The validated caller identity via [`Identity`]
//! - **Cache**: Optional key/value cache via [`CacheStore`] (Redis or in-memory)
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Retry**: Exponential backoff policy via [`RetryPolicy`]
//!
//! # Example
//!
//! ```no_run
//! use sosmed_common::{AppResult, Config, IdGenerator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id = IdGenerator::new().generate();
//!     println!("{} -> {}", config.database.url, id);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod id;
pub mod identity;
pub mod retry;

pub use cache::{CacheError, CacheStore, MemoryCache, RedisCache, SharedCache};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use identity::{Identity, TokenRevocations};
pub use retry::RetryPolicy;
