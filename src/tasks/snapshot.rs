//! Snapshot Task
//!
//! Background task that periodically persists the cache to disk.

use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;

/// Spawns a background task that saves a snapshot every `interval`.
///
/// The first save happens one full interval after startup. A failed save is
/// logged and retried on the next tick; it never stops the task.
///
/// # Arguments
/// * `cache` - Handle to the cache being persisted
/// * `path` - Snapshot file, replaced atomically on every save
/// * `interval` - Time between two saves
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_snapshot_task(cache.clone(), "cache.db".into(), Duration::from_secs(300));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_snapshot_task(cache: Cache, path: PathBuf, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            path = %path.display(),
            "Starting snapshot task with interval of {:?}",
            interval
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.save_to_disk(&path).await {
                Ok(0) => debug!("Snapshot: cache empty, wrote empty snapshot"),
                Ok(saved) => info!("Snapshot: saved {} entries", saved),
                Err(err) => warn!(error = %err, "Snapshot failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_task_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let cache = Cache::new();
        cache.set("k", "v", None).await;

        let handle = spawn_snapshot_task(cache.clone(), path.clone(), Duration::from_millis(50));

        // Wait for at least one tick
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        let restored = Cache::open(&path).await.unwrap();
        assert_eq!(restored.get("k").await.unwrap(), "v");
    }

    #[tokio::test]
    async fn test_snapshot_task_survives_write_failures() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so every save fails
        let path = dir.path().join("missing").join("cache.db");

        let handle = spawn_snapshot_task(Cache::new(), path, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!handle.is_finished(), "Task should keep running after failures");
        handle.abort();
    }

    #[tokio::test]
    async fn test_snapshot_task_can_be_aborted() {
        let dir = tempfile::tempdir().unwrap();
        let handle = spawn_snapshot_task(
            Cache::new(),
            dir.path().join("cache.db"),
            Duration::from_secs(1),
        );

        // Abort immediately
        handle.abort();

        // Wait a bit and verify task is finished
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
