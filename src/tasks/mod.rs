//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Snapshot: Persists the cache to disk at the configured interval

mod snapshot;

pub use snapshot::spawn_snapshot_task;
