//! Cache Module
//!
//! Provides in-memory caching with per-key TTL, lazy and active expiry,
//! operation counters and snapshot persistence.

mod engine;
mod entry;
mod snapshot;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use engine::Cache;
pub use entry::CacheEntry;
pub use snapshot::{Snapshot, SnapshotEntry};
pub use stats::CacheMetrics;
pub use store::CacheStore;
