//! Cache-aside entry point: serve from cache, otherwise race the providers and
//! remember the winner.

use std::{sync::Arc, time::Duration};

use reqwest::Client;
use tracing::{debug, warn};

use crate::{
    Config,
    cache::{CacheStore, MemoryStore},
    error::{CacheError, WeatherError},
    model::{UsageStats, WeatherRecord},
    provider::providers_from_config,
    race::{Deadline, RaceCoordinator},
    stats::UsageCounters,
};

/// Weather lookups for one service instance.
///
/// Construct once and share behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct WeatherService {
    cache: Arc<dyn CacheStore>,
    race: RaceCoordinator,
    counters: UsageCounters,
    ttl: Duration,
}

impl WeatherService {
    pub fn new(cache: Arc<dyn CacheStore>, race: RaceCoordinator, ttl: Duration) -> Self {
        Self { cache, race, counters: UsageCounters::new(), ttl }
    }

    /// Wire providers, cache store and limits from `config`.
    pub fn from_config(config: &Config) -> Result<Self, CacheError> {
        let http = Client::new();
        let providers = providers_from_config(config, &http);
        let race = RaceCoordinator::new(providers, config.race_timeout());

        Ok(Self::new(cache_from_config(config)?, race, config.cache_ttl()))
    }

    /// Current weather for `city`, from cache when fresh.
    pub async fn fetch_weather(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
        self.lookup(city, None).await
    }

    /// Like [`fetch_weather`](Self::fetch_weather), but never waits past `deadline`.
    pub async fn fetch_weather_until(
        &self,
        city: &str,
        deadline: Deadline,
    ) -> Result<WeatherRecord, WeatherError> {
        self.lookup(city, Some(deadline)).await
    }

    pub fn stats(&self) -> UsageStats {
        self.counters.snapshot()
    }

    async fn lookup(
        &self,
        city: &str,
        parent: Option<Deadline>,
    ) -> Result<WeatherRecord, WeatherError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(WeatherError::EmptyCity);
        }

        // A broken store is surfaced instead of silently hammering the providers.
        if let Some(mut record) = self.cache.get(city).await? {
            self.counters.record_cache_hit();
            debug!(city, source = %record.source, "cache hit");
            record.cached = true;
            return Ok(record);
        }

        debug!(city, "cache miss");
        self.counters.record_api_usage();

        let record = self.race.race(city, parent).await?;

        let stored = WeatherRecord { cached: true, ..record.clone() };
        if let Err(err) = self.cache.set(city, &stored, self.ttl).await {
            warn!(error = %err, city, "failed to cache weather result");
        }

        Ok(record)
    }
}

#[cfg(feature = "redis")]
fn cache_from_config(config: &Config) -> Result<Arc<dyn CacheStore>, CacheError> {
    match &config.cache.redis_url {
        Some(url) => Ok(Arc::new(crate::cache::RedisStore::open(url)?)),
        None => Ok(Arc::new(MemoryStore::new(config.cache.max_capacity))),
    }
}

#[cfg(not(feature = "redis"))]
fn cache_from_config(config: &Config) -> Result<Arc<dyn CacheStore>, CacheError> {
    if config.cache.redis_url.is_some() {
        warn!("redis_url is set but redis support is not compiled in, using in-memory cache");
    }
    Ok(Arc::new(MemoryStore::new(config.cache.max_capacity)))
}
