//! Snapshot Module
//!
//! On-disk image of the key space. Keys and values are stored verbatim as
//! byte arrays; entries with a TTL carry the time they had left when the
//! snapshot was taken.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheStore;

/// Full serialization of the live key space.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_ms: Option<u64>,
}

impl Snapshot {
    /// Copies every unexpired entry out of the store.
    pub fn capture(store: &CacheStore) -> Self {
        let entries = store
            .live_entries()
            .map(|(key, entry)| SnapshotEntry {
                key: key.to_vec(),
                value: entry.value.to_vec(),
                expires_in_ms: entry
                    .ttl_remaining()
                    .map(|remaining| remaining.as_millis().max(1) as u64),
            })
            .collect();

        Self {
            saved_at: Utc::now(),
            entries,
        }
    }

    /// Yields `(key, value, ttl)` triples ready for [`CacheStore::restore`].
    pub fn into_entries(self) -> impl Iterator<Item = (Bytes, Bytes, Option<Duration>)> {
        self.entries.into_iter().map(|entry| {
            (
                Bytes::from(entry.key),
                Bytes::from(entry.value),
                entry.expires_in_ms.map(Duration::from_millis),
            )
        })
    }
}
