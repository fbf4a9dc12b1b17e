//! In-process store backed by Moka.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use moka::{Expiry, future::Cache};
use tracing::trace;

use super::{CacheStore, cache_key};
use crate::{error::CacheError, model::WeatherRecord};

/// Default number of cities kept in memory.
pub const DEFAULT_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    payload: Arc<str>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Concurrent in-memory [`CacheStore`].
///
/// Records are kept as serialized JSON, the same payload a remote store would
/// hold, so both stores behave identically on decode. Data is per process and
/// lost on restart.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    cache: Cache<String, Entry>,
}

impl MemoryStore {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).expire_after(EntryTtl).build();
        Self { cache }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, city: &str) -> Result<Option<WeatherRecord>, CacheError> {
        let key = cache_key(city);
        let Some(entry) = self.cache.get(&key).await else {
            trace!(key = %key, "memory cache miss");
            return Ok(None);
        };

        Ok(Some(serde_json::from_str(&entry.payload)?))
    }

    async fn set(
        &self,
        city: &str,
        record: &WeatherRecord,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload: Arc<str> = serde_json::to_string(record)?.into();
        self.cache.insert(cache_key(city), Entry { payload, ttl }).await;
        Ok(())
    }
}
