//! Integration Tests for the Cache API
//!
//! Exercises the public surface end to end, including the background
//! sweeper and the eviction listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

use lru_ttl_cache::{CacheConfig, CacheError, Entry, LruCache, Ttl};

// == Helper Functions ==

fn plain_cache(capacity: usize) -> LruCache<String, String> {
    LruCache::new(CacheConfig {
        capacity,
        ..CacheConfig::default()
    })
    .unwrap()
}

fn s(value: &str) -> String {
    value.to_string()
}

/// Polls until `check` holds or two seconds pass.
async fn eventually(check: impl Fn() -> bool) -> bool {
    timeout(Duration::from_secs(2), async {
        while !check() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

// == Recency Tests ==

#[test]
fn test_touch_resets_recency() {
    let cache = plain_cache(2);

    cache.set(s("a"), s("1"), None);
    cache.set(s("b"), s("2"), None);
    cache.get("a").unwrap();
    cache.set(s("c"), s("3"), None);

    assert!(cache.contains("a"));
    assert!(cache.contains("c"));
    assert_eq!(cache.get("b").unwrap_err(), CacheError::NotFound);
}

#[test]
fn test_keys_and_entries_are_most_recent_first() {
    let cache = plain_cache(0);

    for key in ["a", "b", "c"] {
        cache.set(s(key), key.to_uppercase(), None);
    }
    cache.get("a").unwrap();

    assert_eq!(cache.keys(), vec![s("a"), s("c"), s("b")]);
    let values: Vec<String> = cache.entries().iter().map(|e| e.value().clone()).collect();
    assert_eq!(values, vec![s("A"), s("C"), s("B")]);
}

// == Eviction Callback Tests ==

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_eviction_callback_receives_evicted_entries() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let cache: LruCache<String, u32> = LruCache::builder()
        .capacity(2)
        .on_evict(move |key: &String, value: &u32| sink.lock().push((key.clone(), *value)))
        .build()
        .unwrap();

    cache.set(s("a"), 1, None);
    cache.set(s("b"), 2, None);
    cache.set(s("c"), 3, None);
    cache.set(s("d"), 4, None);

    assert!(eventually(|| seen.lock().len() == 2).await);
    let mut evicted = seen.lock().clone();
    evicted.sort();
    assert_eq!(evicted, vec![(s("a"), 1), (s("b"), 2)]);
    assert_eq!(cache.stats().evictions, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delete_does_not_notify() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&seen);
    let cache: LruCache<String, u32> = LruCache::builder()
        .capacity(1)
        .on_evict(move |key: &String, _: &u32| sink.lock().push(key.clone()))
        .build()
        .unwrap();

    cache.set(s("a"), 1, None);
    assert!(cache.delete("a"));
    cache.set(s("b"), 2, None);
    cache.set(s("c"), 3, None);

    assert!(eventually(|| !seen.lock().is_empty()).await);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(*seen.lock(), vec![s("b")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_callback_does_not_break_cache() {
    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);
    let cache: LruCache<String, u32> = LruCache::builder()
        .capacity(1)
        .on_evict(move |_: &String, _: &u32| {
            *counter.lock() += 1;
            panic!("callback failure");
        })
        .build()
        .unwrap();

    for i in 0..4 {
        cache.set(format!("k{i}"), i, None);
    }

    assert!(eventually(|| *calls.lock() == 3).await);
    assert_eq!(cache.keys(), vec![s("k3")]);
}

// == Sweeper Tests ==

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sweeper_removes_expired_entries() {
    let cache: LruCache<String, String> = LruCache::builder()
        .bucket_width(Duration::from_millis(50))
        .default_ttl(Ttl::After(Duration::from_millis(100)))
        .build()
        .unwrap();

    cache.set(s("short"), s("1"), None);
    cache.set(s("long"), s("2"), Some(Ttl::After(Duration::from_secs(60))));
    cache.set(s("forever"), s("3"), Some(Ttl::Never));
    assert_eq!(cache.size(), 3);

    // No reads in between: only the sweeper can shrink the cache
    assert!(eventually(|| cache.size() == 2).await);
    assert_eq!(cache.stats().expirations, 1);
    assert!(cache.contains("long"));
    assert!(cache.contains("forever"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_notify_on_expire() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&seen);
    let cache: LruCache<String, u32> = LruCache::builder()
        .bucket_width(Duration::from_millis(20))
        .default_ttl(Ttl::After(Duration::from_millis(40)))
        .notify_on_expire(true)
        .on_evict(move |key: &String, _: &u32| sink.lock().push(key.clone()))
        .build()
        .unwrap();

    cache.set(s("ephemeral"), 7, None);

    assert!(eventually(|| seen.lock().contains(&s("ephemeral"))).await);
    assert_eq!(cache.size(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_expiry_not_notified_by_default() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&seen);
    let cache: LruCache<String, u32> = LruCache::builder()
        .bucket_width(Duration::from_millis(20))
        .default_ttl(Ttl::After(Duration::from_millis(40)))
        .on_evict(move |key: &String, _: &u32| sink.lock().push(key.clone()))
        .build()
        .unwrap();

    cache.set(s("ephemeral"), 7, None);

    assert!(eventually(|| cache.size() == 0).await);
    sleep(Duration::from_millis(50)).await;
    assert!(seen.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_stops_sweeper() {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cache: LruCache<String, String> = LruCache::builder()
        .bucket_width(Duration::from_millis(20))
        .default_ttl(Ttl::After(Duration::from_millis(30)))
        .shutdown(shutdown_rx)
        .build()
        .unwrap();

    shutdown_tx.send(true).unwrap();
    sleep(Duration::from_millis(50)).await;

    cache.set(s("k"), s("v"), None);
    sleep(Duration::from_millis(200)).await;

    // Still held, though reads treat it as gone
    assert_eq!(cache.size(), 1);
    assert!(cache.keys().is_empty());
    assert_eq!(cache.peek("k").unwrap_err(), CacheError::Expired);

    // A manual sweep still works
    assert_eq!(cache.sweep_expired(), 1);
    assert_eq!(cache.size(), 0);
}

// == Recover Tests ==

#[test]
fn test_snapshot_roundtrip_through_json() {
    let source = plain_cache(0);
    source.set(s("a"), s("1"), None);
    source.set(s("b"), s("2"), Some(Ttl::After(Duration::from_secs(300))));
    source.set(s("c"), s("3"), None);
    source.get("a").unwrap();

    let snapshot: Vec<Entry<String, String>> =
        source.entries().iter().map(|entry| (**entry).clone()).collect();
    let json = serde_json::to_string(&snapshot).unwrap();
    let restored: Vec<Entry<String, String>> = serde_json::from_str(&json).unwrap();

    let target = plain_cache(0);
    target.set(s("stale"), s("x"), None);
    target.recover(restored);

    assert_eq!(target.keys(), source.keys());
    let original = source.peek("b").unwrap();
    let copy = target.peek("b").unwrap();
    assert_eq!(copy.value(), original.value());
    assert_eq!(copy.creation_time(), original.creation_time());
    assert_eq!(copy.ttl(), original.ttl());
    assert!(!target.contains("stale"));
}

#[test]
fn test_recover_is_atomic_for_readers() {
    let cache: LruCache<String, u32> = LruCache::new(CacheConfig::default()).unwrap();
    let generation = |tag: u32| -> Vec<Entry<String, u32>> {
        (0..200)
            .map(|i| Entry::new(format!("g{tag}-{i}"), tag, Ttl::Never))
            .collect()
    };
    cache.recover(generation(0));
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for round in 1..=50 {
                cache.recover(generation(round % 2));
            }
            done.store(true, Ordering::Release);
        });

        for _ in 0..2 {
            scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    let entries = cache.entries();
                    assert_eq!(entries.len(), 200);
                    let tag = *entries[0].value();
                    assert!(entries.iter().all(|entry| *entry.value() == tag));
                }
            });
        }
    });

    assert_eq!(cache.size(), 200);
}

// == Configuration Tests ==

#[test]
fn test_invalid_configuration_is_rejected() {
    let result: lru_ttl_cache::Result<LruCache<String, u32>> = LruCache::new(CacheConfig {
        initial_shards: 0,
        ..CacheConfig::default()
    });

    assert!(matches!(result, Err(CacheError::Configuration(_))));
}
