//! Behavioural tests for CacheStore: expiry, invalidation, cleanup and
//! concurrent access.

use std::sync::Arc;
use std::thread;

use aerodash_cache::{CacheStore, ManualClock};
use serde_json::json;

fn store() -> (Arc<CacheStore<serde_json::Value>>, ManualClock) {
    let clock = ManualClock::default();
    let store = Arc::new(CacheStore::with_clock(Arc::new(clock.clone())));
    (store, clock)
}

#[test]
fn test_end_to_end_expiry_scenario() {
    let (store, clock) = store();
    let key = "w_USA_NY_Manhattan";

    store.set(key, json!({"temp": 72.5}), 1800).unwrap();
    assert_eq!(store.get(key), Some(json!({"temp": 72.5})));
    assert!(store.keys().contains(&key.to_string()));

    clock.advance_secs(1801);

    assert_eq!(store.get(key), None);
    assert!(!store.keys().contains(&key.to_string()));
    // No resurrection on a second read.
    assert_eq!(store.get(key), None);
}

#[test]
fn test_ttl_monotonicity_across_ttls() {
    for ttl in [1_i64, 2, 60, 3600, 604_800] {
        let (store, clock) = store();
        store.set("k", json!(ttl), ttl).unwrap();
        assert_eq!(store.get("k"), Some(json!(ttl)));
        assert!(!store.is_expired("k"));

        clock.advance_secs(ttl + 1);
        assert!(store.is_expired("k"));
        assert_eq!(store.get("k"), None);
        assert_eq!(store.get("k"), None);
    }
}

#[test]
fn test_cleanup_removes_only_expired() {
    let (store, clock) = store();
    for i in 0..4 {
        store.set(format!("short-{i}"), json!(i), 10).unwrap();
    }
    for i in 0..3 {
        store.set(format!("long-{i}"), json!(i), 1000).unwrap();
    }
    clock.advance_secs(11);

    assert_eq!(store.cleanup_expired(), 4);
    assert_eq!(store.len(), 3);
    for i in 0..3 {
        assert_eq!(store.get(&format!("long-{i}")), Some(json!(i)));
    }
    assert_eq!(store.cleanup_expired(), 0);
}

#[test]
fn test_invalidate_returns_true_once() {
    let (store, _) = store();
    store.set("k", json!(1), 60).unwrap();
    let results: Vec<bool> = (0..5).map(|_| store.invalidate("k")).collect();
    assert_eq!(results, vec![true, false, false, false, false]);
}

#[test]
fn test_concurrent_access_keeps_counters_consistent() {
    let (store, _) = store();
    let threads = 8;
    let per_thread = 200;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..per_thread {
                    let key = format!("t{t}-{i}");
                    store.set(key.clone(), json!(i), 60).unwrap();
                    assert_eq!(store.get(&key), Some(json!(i)));
                    store.get("absent");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = store.stats();
    let total = (threads * per_thread) as u64;
    assert_eq!(stats.total_entries, threads * per_thread);
    assert_eq!(stats.hits, total);
    assert_eq!(stats.misses, total);
    assert!((stats.hit_rate - 50.0).abs() < 1e-9);
}
