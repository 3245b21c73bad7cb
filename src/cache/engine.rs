//! Cache Engine Module
//!
//! Thread-safe handle over [`CacheStore`] that adds active expiry and
//! snapshot persistence.
//!
//! All mutations take the write lock; `has`, `keys` and `metrics` share the
//! read lock. `get` needs the write lock because it bumps the hit/miss
//! counters. The whole key space sits behind this one lock, which is the
//! throughput ceiling of the engine.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::snapshot::Snapshot;
use crate::cache::{CacheMetrics, CacheStore};
use crate::error::{CacheError, Result};

// == Cache ==
/// Cloneable, shareable cache handle.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    store: Arc<RwLock<CacheStore>>,
}

impl Cache {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Open ==
    /// Creates a cache hydrated from the snapshot at `path`, or an empty one
    /// when no snapshot exists yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let cache = Self::new();
        if tokio::fs::try_exists(path).await? {
            let restored = cache.load_from_disk(path).await?;
            info!(path = %path.display(), restored, "snapshot loaded");
        } else {
            info!(path = %path.display(), "no snapshot found, starting empty");
        }
        Ok(cache)
    }

    // == Set ==
    /// Upserts a key. A non-zero TTL arms a one-shot eviction timer.
    pub async fn set(&self, key: impl Into<Bytes>, value: impl Into<Bytes>, ttl: Option<Duration>) {
        let key = key.into();
        let ttl = ttl.filter(|ttl| !ttl.is_zero());
        {
            let mut store = self.store.write().await;
            store.set(key.clone(), value.into(), ttl);
        }
        debug!(?key, ?ttl, "SET");

        if let Some(ttl) = ttl {
            self.schedule_eviction(key, ttl);
        }
    }

    // == Batch Set ==
    /// Upserts every pair under a single write-lock acquisition.
    pub async fn batch_set<I>(&self, pairs: I, ttl: Option<Duration>)
    where
        I: IntoIterator<Item = (Bytes, Bytes)>,
    {
        let ttl = ttl.filter(|ttl| !ttl.is_zero());
        let pairs: Vec<(Bytes, Bytes)> = pairs.into_iter().collect();
        let keys: Vec<Bytes> = pairs.iter().map(|(key, _)| key.clone()).collect();
        {
            let mut store = self.store.write().await;
            store.batch_set(pairs, ttl);
        }
        debug!(count = keys.len(), ?ttl, "BATCH SET");

        if let Some(ttl) = ttl {
            for key in keys {
                self.schedule_eviction(key, ttl);
            }
        }
    }

    // == Get ==
    /// Returns the value for a live key.
    ///
    /// When the key turns out to be expired, its removal is scheduled in the
    /// background and the caller gets [`CacheError::Expired`] straight away.
    pub async fn get(&self, key: impl AsRef<[u8]>) -> Result<Bytes> {
        let key = key.as_ref();
        let result = {
            let mut store = self.store.write().await;
            store.get(key)
        };

        if let Err(CacheError::Expired(_)) = &result {
            self.schedule_cleanup(Bytes::copy_from_slice(key));
        }
        result
    }

    pub async fn has(&self, key: impl AsRef<[u8]>) -> bool {
        self.store.read().await.has(key.as_ref())
    }

    // == Delete ==
    /// Removes a key. Idempotent; always counted.
    pub async fn delete(&self, key: impl AsRef<[u8]>) {
        let key = key.as_ref();
        let removed = self.store.write().await.delete(key);
        debug!(key = ?Bytes::copy_from_slice(key), removed, "DELETE");
    }

    /// Fresh snapshot of the live keys, unordered.
    pub async fn keys(&self) -> Vec<Bytes> {
        self.store.read().await.keys()
    }

    /// Point-in-time copy of the counters.
    pub async fn metrics(&self) -> CacheMetrics {
        self.store.read().await.metrics()
    }

    /// Number of stored entries, including expired ones awaiting eviction.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    // == Persistence ==
    /// Writes a snapshot of the live key space to `path`.
    ///
    /// The file is written next to the target and renamed over it, so a crash
    /// mid-save leaves the previous snapshot intact. Returns the number of
    /// entries saved.
    pub async fn save_to_disk(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let snapshot = {
            let store = self.store.read().await;
            Snapshot::capture(&store)
        };
        let count = snapshot.entries.len();
        let encoded = serde_json::to_vec(&snapshot)?;

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, encoded).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(path = %path.display(), count, "snapshot saved");
        Ok(count)
    }

    /// Merges the snapshot at `path` into the cache and re-arms remaining
    /// TTLs. Returns the number of entries restored.
    pub async fn load_from_disk(&self, path: impl AsRef<Path>) -> Result<usize> {
        let raw = tokio::fs::read(path.as_ref()).await?;
        let snapshot: Snapshot = serde_json::from_slice(&raw)?;

        let mut timers = Vec::new();
        let mut count = 0;
        {
            let mut store = self.store.write().await;
            for (key, value, ttl) in snapshot.into_entries() {
                if let Some(ttl) = ttl {
                    timers.push((key.clone(), ttl));
                }
                store.restore(key, value, ttl);
                count += 1;
            }
        }

        for (key, ttl) in timers {
            self.schedule_eviction(key, ttl);
        }
        Ok(count)
    }

    // == Expiry ==
    /// Arms the active-expiry timer for `key`.
    ///
    /// The timer holds only a weak reference, so pending timers never keep a
    /// dropped cache alive.
    fn schedule_eviction(&self, key: Bytes, ttl: Duration) {
        let store = Arc::downgrade(&self.store);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            evict_if_expired(store, &key).await;
        });
    }

    /// Lazy-expiry cleanup triggered by a read.
    fn schedule_cleanup(&self, key: Bytes) {
        let store = Arc::downgrade(&self.store);
        tokio::spawn(async move {
            evict_if_expired(store, &key).await;
        });
    }
}

async fn evict_if_expired(store: Weak<RwLock<CacheStore>>, key: &[u8]) {
    let Some(store) = store.upgrade() else {
        return;
    };
    if store.write().await.evict_if_expired(key) {
        debug!(key = ?Bytes::copy_from_slice(key), "EVICTED");
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
