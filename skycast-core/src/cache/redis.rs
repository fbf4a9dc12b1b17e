//! Redis-backed store, shared by every service instance pointed at it.

use std::time::Duration;

use async_trait::async_trait;
use redis::{Client, RedisError, aio::ConnectionManager};
use tokio::sync::OnceCell;
use tracing::trace;

use super::{CacheStore, cache_key};
use crate::{error::CacheError, model::WeatherRecord};

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        CacheError::Connection(Box::new(err))
    }
}

/// [`CacheStore`] over plain Redis strings with a millisecond expiry.
///
/// The connection is opened on first use and reconnects on its own afterwards.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connected", &self.connection.initialized())
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Validates `url` without connecting.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        Ok(Self { client, connection: OnceCell::new() })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| {
                trace!("opening redis connection manager");
                self.client.get_connection_manager()
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, city: &str) -> Result<Option<WeatherRecord>, CacheError> {
        let mut con = self.connection().await?;
        let payload: Option<String> =
            redis::cmd("GET").arg(cache_key(city)).query_async(&mut con).await?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        city: &str,
        record: &WeatherRecord,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_string(record)?;
        // PX rejects zero.
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let mut con = self.connection().await?;
        redis::cmd("SET")
            .arg(cache_key(city))
            .arg(payload)
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<()>(&mut con)
            .await?;
        Ok(())
    }
}
