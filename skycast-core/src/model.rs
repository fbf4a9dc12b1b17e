use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

/// Current conditions for one city, as produced by exactly one provider.
///
/// Serialized with camelCase field names, the same as [`UsageStats`]. Cache
/// stores hold this exact JSON, so renaming a field invalidates cached entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    /// City name as reported by the provider, not the query.
    pub city: String,
    pub temperature_celsius: f64,
    pub humidity_percent: u8,
    pub condition: String,
    pub source: ProviderId,
    /// Set by the service, never by a provider.
    pub cached: bool,
    /// Time of the original fetch, kept as-is when served from cache.
    pub observed_at: DateTime<Utc>,
}

/// Snapshot of the service usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub api_usage_count: u64,
    pub cache_hit_count: u64,
}
