//! Storage for recently fetched weather records.
//!
//! The service only relies on the [`CacheStore`] contract: `get` tells a miss
//! apart from a failure, and `set` stores a record for a bounded time. Keys are
//! case-insensitive city names; stores normalize them with [`cache_key`].

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;

use crate::{error::CacheError, model::WeatherRecord};

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

/// Default lifetime of a cached record.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// `Ok(None)` is a miss; `Err` means the store itself is unhealthy.
    async fn get(&self, city: &str) -> Result<Option<WeatherRecord>, CacheError>;

    /// Replace whatever is stored for `city` and expire it after `ttl`.
    async fn set(&self, city: &str, record: &WeatherRecord, ttl: Duration)
    -> Result<(), CacheError>;
}

/// Normalized storage key for a city query.
pub fn cache_key(city: &str) -> String {
    city.trim().to_lowercase()
}
