//! Cache Metrics Module
//!
//! Tracks hit, miss, set and delete counters.

use serde::{Deserialize, Serialize};

// == Cache Metrics ==
/// Monotonic operation counters.
///
/// Serialized with PascalCase field names, which is the METRICS reply body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CacheMetrics {
    /// Number of successful GETs
    pub hits: u64,
    /// Number of failed GETs (key not found or expired)
    pub misses: u64,
    /// Number of keys written, one per pair for batches
    pub sets: u64,
    /// Number of deletes, including expiry evictions
    pub deletes: u64,
}

impl CacheMetrics {
    // == Constructor ==
    /// Creates a new CacheMetrics with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }
}
