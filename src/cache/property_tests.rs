//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the TTL cache against a plain `HashMap` model.

use proptest::prelude::*;
use std::collections::HashMap;
use std::thread::sleep;
use std::time::Duration;

use crate::cache::TtlCache;

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,3}".prop_map(|s| s)
}

/// Generates cache values
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,64}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Without TTLs the cache behaves exactly like a map.
    #[test]
    fn prop_matches_map_model(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let cache = TtlCache::new();
        let mut model: HashMap<String, String> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(key.clone(), value.clone(), Duration::ZERO);
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(cache.get(&key), model.get(&key).cloned());
                }
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                    model.remove(&key);
                }
            }
        }

        prop_assert_eq!(cache.len(), model.len());
    }

    #[test]
    fn prop_delete_then_get_misses(key in key_strategy(), value in value_strategy()) {
        let cache = TtlCache::new();

        cache.set(key.clone(), value, Duration::from_secs(60));
        prop_assert!(cache.get(&key).is_some());

        cache.delete(&key);
        prop_assert!(cache.get(&key).is_none());
    }

    #[test]
    fn prop_last_write_wins(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let cache = TtlCache::new();

        cache.set(key.clone(), value1, Duration::from_secs(60));
        cache.set(key.clone(), value2.clone(), Duration::ZERO);

        prop_assert_eq!(cache.get(&key), Some(value2));
        prop_assert_eq!(cache.len(), 1);
    }
}

// Fewer cases for the sleeping TTL check
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    #[test]
    fn prop_ttl_hides_value_after_expiry(key in key_strategy(), value in value_strategy()) {
        let cache = TtlCache::new();

        cache.set(key.clone(), value.clone(), Duration::from_millis(40));
        prop_assert_eq!(cache.get(&key), Some(value));

        sleep(Duration::from_millis(70));

        prop_assert!(cache.get(&key).is_none());
    }
}
