//! Core library for `skycast`.
//!
//! This crate defines:
//! - Weather providers behind a single [`WeatherProvider`] trait
//! - A race over all providers bounded by one shared [`Deadline`]
//! - Cache stores with a per-entry TTL (in-memory, optionally Redis)
//! - [`WeatherService`], the cache-aside entry point, with usage counters
//! - Configuration loading (TOML file plus environment overrides)
//!
//! It is used by `skycast-cli`, but can also be embedded in an HTTP service:
//! build one [`WeatherService`], wrap it in an `Arc` and share it.

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod race;
pub mod service;
pub mod stats;

pub use cache::{CacheStore, MemoryStore};
pub use config::{CacheSettings, Config, ProviderSettings, RaceSettings};
pub use error::{CacheError, ConfigError, ProviderError, WeatherError};
pub use model::{UsageStats, WeatherRecord};
pub use provider::{ProviderId, WeatherProvider};
pub use race::{Deadline, RaceCoordinator};
pub use service::WeatherService;
