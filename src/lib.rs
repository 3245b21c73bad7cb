//! distcache - an in-memory TTL cache served over a line protocol
//!
//! Provides per-key TTL with lazy and active expiry, operation metrics,
//! snapshot persistence and asynchronous leader-to-follower replication.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod replication;
pub mod server;
pub mod tasks;

pub use cache::{Cache, CacheMetrics};
pub use client::CacheClient;
pub use config::Config;
pub use error::{CacheError, ProtocolError, Result};
pub use protocol::{Command, Message, Reply};
pub use server::Server;
pub use tasks::spawn_snapshot_task;
