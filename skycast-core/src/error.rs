//! Error types for lookups, providers and cache stores.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::provider::ProviderId;

/// Failure of a single provider attempt.
///
/// None of these abort a race on their own; the coordinator records them and
/// keeps waiting for the remaining providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Base URL or API key missing for this provider.
    #[error("{provider}: {setting} is not configured")]
    Configuration { provider: ProviderId, setting: &'static str },

    #[error("{provider}: request failed: {source}")]
    Transport {
        provider: ProviderId,
        #[source]
        source: reqwest::Error,
    },

    /// Provider answered with a non-success HTTP status.
    #[error("{provider} returned status {status}: {body}")]
    Status { provider: ProviderId, status: u16, body: String },

    #[error("{provider}: malformed response: {source}")]
    Decode {
        provider: ProviderId,
        #[source]
        source: serde_json::Error,
    },

    /// The provider task panicked or was torn down before reporting.
    #[error("provider task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failure surfaced to callers of [`WeatherService`](crate::WeatherService).
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("city must not be empty")]
    EmptyCity,

    #[error("no weather providers are registered")]
    NoProviders,

    #[error("timeout exceeded while fetching weather data ({timeout:?})")]
    DeadlineExceeded { timeout: Duration },

    #[error("all providers failed ({failures} attempts): {last}")]
    AllProvidersFailed {
        failures: usize,
        #[source]
        last: ProviderError,
    },

    #[error("cache lookup failed: {0}")]
    Cache(#[from] CacheError),
}

/// Failure of a cache store operation.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Transport or backend failure (e.g. Redis unreachable).
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),

    /// Stored payload could not be encoded or decoded.
    #[error("cache payload: {0}")]
    Format(#[from] serde_json::Error),
}

/// Failure loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoConfigDir,

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize configuration to TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown provider '{0}'. Supported providers: openweather, weatherapi.")]
    UnknownProvider(String),
}
