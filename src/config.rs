//! Configuration Module
//!
//! Handles loading and managing node configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::replication::RetryPolicy;

/// Node configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the TCP listener binds to
    pub listen_addr: String,
    /// Leader to replicate from; None makes this node the leader
    pub leader_addr: Option<String>,
    /// Snapshot file; None disables persistence
    pub storage_path: Option<PathBuf>,
    /// Interval between periodic snapshots
    pub save_interval: Duration,
    /// Attempts per replication write and per leader dial
    pub max_retries: u32,
    /// Fixed pause between attempts
    pub retry_delay: Duration,
    /// Per-read deadline on every connection, None = wait forever
    pub read_timeout: Option<Duration>,
    /// Per-write deadline on every connection, None = wait forever
    pub write_timeout: Option<Duration>,
    /// Capacity of the replication fan-out queue
    pub replication_queue: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `LISTEN_ADDR` - Listen address (default: 0.0.0.0:3000)
    /// - `LEADER_ADDR` - Leader address, empty means leader (default: empty)
    /// - `STORAGE_PATH` - Snapshot path, empty disables persistence (default: empty)
    /// - `SAVE_INTERVAL_SECS` - Snapshot interval (default: 300)
    /// - `MAX_RETRIES` - Replication and dial attempts (default: 3)
    /// - `RETRY_DELAY_MS` - Delay between attempts (default: 1000)
    /// - `READ_TIMEOUT_SECS` - Read deadline, 0 disables (default: 0)
    /// - `WRITE_TIMEOUT_SECS` - Write deadline, 0 disables (default: 10)
    /// - `REPLICATION_QUEUE` - Fan-out queue capacity (default: 1024)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            leader_addr: non_empty_var("LEADER_ADDR"),
            storage_path: non_empty_var("STORAGE_PATH").map(PathBuf::from),
            save_interval: parsed_var("SAVE_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.save_interval),
            max_retries: parsed_var("MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_delay: parsed_var("RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            read_timeout: parsed_var("READ_TIMEOUT_SECS")
                .map(optional_secs)
                .unwrap_or(defaults.read_timeout),
            write_timeout: parsed_var("WRITE_TIMEOUT_SECS")
                .map(optional_secs)
                .unwrap_or(defaults.write_timeout),
            replication_queue: parsed_var("REPLICATION_QUEUE")
                .unwrap_or(defaults.replication_queue),
        }
    }

    /// A node without a leader address is the leader.
    pub fn is_leader(&self) -> bool {
        self.leader_addr.is_none()
    }

    /// Retry policy shared by replication writes and leader dials.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            leader_addr: None,
            storage_path: None,
            save_interval: Duration::from_secs(5 * 60),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            read_timeout: None,
            write_timeout: Some(Duration::from_secs(10)),
            replication_queue: 1024,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
