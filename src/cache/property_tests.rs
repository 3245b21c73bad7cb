//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store against a simple model of its counters
//! and contents.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::thread::sleep;
use std::time::Duration;

use bytes::Bytes;

use crate::cache::CacheStore;

// == Strategies ==
/// Generates cache keys; the store treats them as opaque bytes
fn valid_key_strategy() -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 1..16).prop_map(Bytes::from)
}

/// Generates valid cache values
fn valid_value_strategy() -> impl Strategy<Value = Bytes> {
    "[a-zA-Z0-9]{1,64}".prop_map(Bytes::from)
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: Bytes, value: Bytes },
    Get { key: Bytes },
    Delete { key: Bytes },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any sequence of operations, every counter matches the number of
    // operations of its kind, and the key set matches a plain HashMap model.
    #[test]
    fn prop_metrics_and_contents_match_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let mut store = CacheStore::new();
        let mut model: HashMap<Bytes, Bytes> = HashMap::new();
        let (mut hits, mut misses, mut sets, mut deletes) = (0u64, 0u64, 0u64, 0u64);

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    store.set(key.clone(), value.clone(), None);
                    model.insert(key, value);
                    sets += 1;
                }
                CacheOp::Get { key } => {
                    match (store.get(&key), model.get(&key)) {
                        (Ok(got), Some(expected)) => {
                            prop_assert_eq!(&got, expected);
                            hits += 1;
                        }
                        (Err(err), None) => {
                            prop_assert!(err.is_not_found());
                            misses += 1;
                        }
                        (got, expected) => {
                            prop_assert!(false, "store returned {:?}, model {:?}", got, expected);
                        }
                    }
                }
                CacheOp::Delete { key } => {
                    store.delete(&key);
                    model.remove(&key);
                    deletes += 1;
                }
            }
        }

        let metrics = store.metrics();
        prop_assert_eq!(metrics.hits, hits, "Hits mismatch");
        prop_assert_eq!(metrics.misses, misses, "Misses mismatch");
        prop_assert_eq!(metrics.sets, sets, "Sets mismatch");
        prop_assert_eq!(metrics.deletes, deletes, "Deletes mismatch");

        let keys: HashSet<Bytes> = store.keys().into_iter().collect();
        let expected: HashSet<Bytes> = model.keys().cloned().collect();
        prop_assert_eq!(keys, expected);
    }

    // Storing V1 then V2 under the same key leaves exactly one entry holding V2.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        let mut store = CacheStore::new();

        store.set(key.clone(), value1, None);
        store.set(key.clone(), value2.clone(), None);

        prop_assert_eq!(store.get(&key).unwrap(), value2);
        prop_assert_eq!(store.len(), 1);
    }

    // `has` agrees with `get` and never moves a counter.
    #[test]
    fn prop_has_is_side_effect_free(
        present in prop::collection::hash_set(valid_key_strategy(), 0..10),
        candidate in valid_key_strategy()
    ) {
        let mut store = CacheStore::new();
        for key in &present {
            store.set(key.clone(), Bytes::from_static(b"v"), None);
        }
        let before = store.metrics();

        prop_assert_eq!(store.has(&candidate), present.contains(&candidate));
        prop_assert_eq!(store.metrics(), before);
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // After the TTL has elapsed the key is gone from every read path.
    #[test]
    fn prop_ttl_expiration_behavior(
        key in valid_key_strategy(),
        value in valid_value_strategy()
    ) {
        let mut store = CacheStore::new();

        store.set(key.clone(), value.clone(), Some(Duration::from_millis(50)));
        prop_assert_eq!(store.get(&key).unwrap(), value);

        sleep(Duration::from_millis(60));

        prop_assert!(store.get(&key).unwrap_err().is_not_found());
        prop_assert!(!store.has(&key));
        prop_assert!(store.keys().is_empty());
    }
}
