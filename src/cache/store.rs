//! Cache Store Module
//!
//! Single-threaded storage core: the key map with per-entry expiry plus the
//! metrics record. [`Cache`](super::Cache) wraps it in a lock and drives the
//! eviction timers.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::cache::{CacheEntry, CacheMetrics};
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Key-value storage with TTL bookkeeping and operation counters.
///
/// Value and expiry live in the same entry, so an expiry can never exist
/// for a key that has no value.
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<Bytes, CacheEntry>,
    /// Operation counters
    metrics: CacheMetrics,
}

impl CacheStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Stores a key-value pair with optional TTL.
    ///
    /// Always overwrites: the previous value and any previous expiry are
    /// replaced, so a key set without TTL can not inherit a stale one.
    pub fn set(&mut self, key: Bytes, value: Bytes, ttl: Option<Duration>) {
        self.entries.insert(key, CacheEntry::new(value, ttl));
        self.metrics.record_set();
    }

    // == Batch Set ==
    /// Applies [`set`](Self::set) to every pair.
    pub fn batch_set<I>(&mut self, pairs: I, ttl: Option<Duration>)
    where
        I: IntoIterator<Item = (Bytes, Bytes)>,
    {
        for (key, value) in pairs {
            self.set(key, value, ttl);
        }
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Expired entries are left in place and reported as [`CacheError::Expired`];
    /// removing them is the caller's job so that reads stay cheap.
    pub fn get(&mut self, key: &[u8]) -> Result<Bytes> {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                self.metrics.record_miss();
                Err(CacheError::Expired(display_key(key)))
            }
            Some(entry) => {
                let value = entry.value.clone();
                self.metrics.record_hit();
                Ok(value)
            }
            None => {
                self.metrics.record_miss();
                Err(CacheError::NotFound(display_key(key)))
            }
        }
    }

    // == Has ==
    /// Presence check using the same expiry rule as `get`, without counting.
    pub fn has(&self, key: &[u8]) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Delete ==
    /// Removes an entry by key.
    ///
    /// Counts a delete whether or not the key existed. Returns whether
    /// something was removed.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.metrics.record_delete();
        self.entries.remove(key).is_some()
    }

    // == Evict If Expired ==
    /// Removes the key only if its *current* expiry has passed.
    ///
    /// Timers armed for an older TTL find a later expiry (or none) after the
    /// key was set again and leave it alone.
    pub fn evict_if_expired(&mut self, key: &[u8]) -> bool {
        let now = Instant::now();
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now));

        if expired {
            self.entries.remove(key);
            self.metrics.record_delete();
        }
        expired
    }

    // == Keys ==
    /// Returns every live key, in no particular order.
    pub fn keys(&self) -> Vec<Bytes> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Live Entries ==
    /// Iterates over unexpired entries.
    pub fn live_entries(&self) -> impl Iterator<Item = (&Bytes, &CacheEntry)> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(move |(_, entry)| !entry.is_expired_at(now))
    }

    // == Restore ==
    /// Inserts an entry without touching the counters, used when loading a
    /// snapshot.
    pub fn restore(&mut self, key: Bytes, value: Bytes, ttl: Option<Duration>) {
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    // == Metrics ==
    /// Returns a copy of the current counters.
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics
    }

    // == Length ==
    /// Returns the number of stored entries, expired ones not yet evicted
    /// included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Text form of a key for error messages only.
fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread::sleep;

    fn val(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[test]
    fn test_store_new() {
        let store = CacheStore::new();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.metrics(), CacheMetrics::default());
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = CacheStore::new();

        store.set("key1".into(), val("value1"), None);
        let value = store.get(b"key1").unwrap();

        assert_eq!(value, val("value1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = CacheStore::new();

        assert!(!store.has(b"nonexistent"));
        let result = store.get(b"nonexistent");
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_store_delete() {
        let mut store = CacheStore::new();

        store.set("key1".into(), val("value1"), None);
        assert!(store.delete(b"key1"));

        assert!(store.is_empty());
        assert!(matches!(store.get(b"key1"), Err(CacheError::NotFound(_))));
    }

    #[test]
    fn test_store_delete_nonexistent_still_counts() {
        let mut store = CacheStore::new();

        assert!(!store.delete(b"nonexistent"));
        assert_eq!(store.metrics().deletes, 1);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = CacheStore::new();

        store.set("key1".into(), val("value1"), None);
        store.set("key1".into(), val("value2"), None);

        assert_eq!(store.get(b"key1").unwrap(), val("value2"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.metrics().sets, 2);
    }

    #[test]
    fn test_store_ttl_expiration() {
        let mut store = CacheStore::new();

        store.set("key1".into(), val("value1"), Some(Duration::from_millis(50)));
        assert!(store.get(b"key1").is_ok());

        sleep(Duration::from_millis(60));

        assert!(!store.has(b"key1"));
        assert!(matches!(store.get(b"key1"), Err(CacheError::Expired(_))));
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_set_without_ttl_clears_previous_expiry() {
        let mut store = CacheStore::new();

        store.set("k".into(), val("v1"), Some(Duration::from_millis(20)));
        store.set("k".into(), val("v2"), None);

        sleep(Duration::from_millis(30));

        assert_eq!(store.get(b"k").unwrap(), val("v2"));
    }

    #[test]
    fn test_evict_if_expired() {
        let mut store = CacheStore::new();

        store.set("short".into(), val("v"), Some(Duration::from_millis(10)));
        store.set("long".into(), val("v"), Some(Duration::from_secs(60)));
        store.set("forever".into(), val("v"), None);

        sleep(Duration::from_millis(20));

        assert!(store.evict_if_expired(b"short"));
        assert!(!store.evict_if_expired(b"long"));
        assert!(!store.evict_if_expired(b"forever"));
        assert!(!store.evict_if_expired(b"missing"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.metrics().deletes, 1);
    }

    #[test]
    fn test_batch_set() {
        let mut store = CacheStore::new();
        store.batch_set(
            vec![
                ("a".into(), val("1")),
                ("b".into(), val("2")),
                ("c".into(), val("3")),
            ],
            None,
        );

        let keys: HashSet<Bytes> = store.keys().into_iter().collect();
        let expected: HashSet<Bytes> = [val("a"), val("b"), val("c")].into_iter().collect();
        assert_eq!(keys, expected);
        assert_eq!(store.metrics().sets, 3);
    }

    #[test]
    fn test_store_metrics() {
        let mut store = CacheStore::new();

        store.set("key1".into(), val("value1"), None);
        store.set("key2".into(), val("value2"), None);
        store.get(b"key1").unwrap();
        let _ = store.get(b"nonexistent");

        let metrics = store.metrics();
        assert_eq!(metrics.sets, 2);
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.deletes, 0);
    }

    #[test]
    fn test_keys_are_opaque_bytes() {
        let mut store = CacheStore::new();
        store.set(Bytes::from_static(b"a\xff"), val("one"), None);
        store.set(Bytes::from_static(b"a\xfe"), val("two"), None);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(b"a\xff").unwrap(), val("one"));
        assert_eq!(store.get(b"a\xfe").unwrap(), val("two"));
        assert!(!store.has(b"a\xef\xbf\xbd"));
    }

    #[test]
    fn test_restore_does_not_count() {
        let mut store = CacheStore::new();
        store.restore("k".into(), val("v"), None);

        assert!(store.has(b"k"));
        assert_eq!(store.metrics().sets, 0);
    }
}
