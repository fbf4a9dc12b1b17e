use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::UsageStats;

/// Per-instance usage counters. Monotonic, never reset.
#[derive(Debug, Default)]
pub struct UsageCounters {
    api_usage: AtomicU64,
    cache_hits: AtomicU64,
}

impl UsageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// One upstream race was started.
    pub fn record_api_usage(&self) {
        self.api_usage.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageStats {
        UsageStats {
            api_usage_count: self.api_usage.load(Ordering::Relaxed),
            cache_hit_count: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}
