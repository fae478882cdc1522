//! Cache Store Module
//!
//! Main cache engine combining sharded map storage with a shared recency
//! list and a bucketed expiry index.
//!
//! # Lock order
//! Every path acquires locks in this order and never the reverse:
//! 1. key-space shard table (held shared by every per-key access)
//! 2. the key's shard
//! 3. the recency list
//! 4. an expiry-index stripe
//!
//! The recency list lock is only ever held for O(1) list surgery, and no
//! lock is held while the eviction callback runs.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{debug, error};

use crate::cache::builder::CacheBuilder;
use crate::cache::expiry::ExpiryIndex;
use crate::cache::lru::{NodeId, RecencyList};
use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheStats, Entry, Ttl};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::locks::AdaptiveLock;
use crate::tasks::{Notifier, Sweep};

/// Map slot: the current entry plus its node in the recency list.
struct Slot<K, V> {
    entry: Arc<Entry<K, V>>,
    node: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Deleted,
    Evicted,
    Expired,
}

// == Cache Inner ==
/// State shared between cache handles and the background sweeper.
pub(crate) struct CacheInner<K, V> {
    shards: AdaptiveLock<K, Slot<K, V>>,
    list: RwLock<RecencyList<Arc<Entry<K, V>>>>,
    expiry: ExpiryIndex<K>,
    capacity: AtomicUsize,
    default_ttl: Option<Ttl>,
    /// Register finite TTLs in the expiry index (a sweeper is running)
    track_expiry: bool,
    notify_on_expire: bool,
    notifier: Option<Notifier<K, V>>,
    stats: StatsRecorder,
}

impl<K, V> CacheInner<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(
        config: &CacheConfig,
        track_expiry: bool,
        notifier: Option<Notifier<K, V>>,
    ) -> Self {
        Self {
            shards: AdaptiveLock::new(config.initial_shards, config.max_shards),
            list: RwLock::new(RecencyList::new()),
            expiry: ExpiryIndex::new(config.bucket_width, config.expiry_stripes),
            capacity: AtomicUsize::new(config.capacity),
            default_ttl: config.default_ttl,
            track_expiry,
            notify_on_expire: config.notify_on_expire,
            notifier,
            stats: StatsRecorder::default(),
        }
    }

    /// Removes `key` if it is still present (and still on `node`, when given).
    ///
    /// Expiry removals additionally require the entry to have expired, so a
    /// stale expiry record never removes a live entry.
    fn remove_if<Q>(&self, key: &Q, node: Option<NodeId>, reason: Removal) -> Option<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.shards.with_write(key, |map| {
            let slot = map.get(key)?;
            let slot_node = slot.node;
            if node.is_some_and(|node| node != slot_node) {
                return None;
            }
            if reason == Removal::Expired && !slot.entry.is_expired() {
                return None;
            }

            {
                let mut list = self.list.write();
                // Only the current tail is evicted; a touched node is left for the next pass
                if reason == Removal::Evicted
                    && list.back().map(|(tail, _)| tail) != Some(slot_node)
                {
                    return None;
                }
                list.remove(slot_node);
            }
            map.remove(key).map(|slot| slot.entry)
        });

        if let Some(entry) = &removed {
            self.after_removal(Arc::clone(entry), reason);
        }
        removed
    }

    fn after_removal(&self, entry: Arc<Entry<K, V>>, reason: Removal) {
        let notify = match reason {
            Removal::Deleted => false,
            Removal::Evicted => {
                self.stats.record_eviction();
                debug!("Evicted least recently used entry");
                true
            }
            Removal::Expired => {
                self.stats.record_expiration();
                debug!("Removed expired entry");
                self.notify_on_expire
            }
        };

        if notify {
            if let Some(notifier) = &self.notifier {
                notifier.notify(entry);
            }
        }
    }

    /// Evicts from the recency-list tail until the cache is within capacity.
    fn evict_overflow(&self) {
        loop {
            let capacity = self.capacity.load(Ordering::Acquire);
            if capacity == 0 {
                return;
            }

            let (key, node) = {
                let list = self.list.read();
                if list.len() <= capacity {
                    return;
                }
                match list.back() {
                    Some((node, entry)) => (entry.key().clone(), node),
                    None => {
                        let err = CacheError::CapacityViolation(format!(
                            "{} entries counted over capacity {} but the recency list is empty",
                            list.len(),
                            capacity
                        ));
                        error!(error = %err, "Eviction found nothing to evict");
                        return;
                    }
                }
            };

            // The tail may have been touched or removed since the list lock
            // was released; a miss just means the next pass re-reads it.
            self.remove_if(&key, Some(node), Removal::Evicted);
        }
    }

    fn register_expiry(&self, entry: &Entry<K, V>, node: NodeId) {
        if !self.track_expiry {
            return;
        }
        if let Some(expiry_time) = entry.expiry_time() {
            self.expiry.insert(expiry_time, entry.key().clone(), node);
        }
    }

    fn len(&self) -> usize {
        self.list.read().len()
    }
}

impl<K, V> Sweep for CacheInner<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn sweep(&self) -> usize {
        self.expiry
            .drain_elapsed(Utc::now())
            .into_iter()
            .filter(|record| {
                self.remove_if(&record.key, Some(record.node), Removal::Expired)
                    .is_some()
            })
            .count()
    }
}

// == LRU Cache ==
/// Concurrent cache with LRU eviction and bucketed TTL expiry.
///
/// Handles are cheap to clone and share one underlying cache. Every method
/// takes `&self` and may be called from any number of threads.
pub struct LruCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Clone for LruCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Hash + Eq, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Separate statements: each lock is released before the next is taken
        let shards = self.inner.shards.shard_count();
        let size = self.inner.list.read().len();
        let capacity = self.inner.capacity.load(Ordering::Relaxed);

        f.debug_struct("LruCache")
            .field("size", &size)
            .field("capacity", &capacity)
            .field("shards", &shards)
            .finish()
    }
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache from a configuration, with no callback or initial state.
    pub fn new(config: CacheConfig) -> Result<Self> {
        CacheBuilder::new().config(config).build()
    }

    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }

    pub(crate) fn from_inner(inner: Arc<CacheInner<K, V>>) -> Self {
        Self { inner }
    }

    // == Get ==
    /// Retrieves an entry and marks it most recently used.
    ///
    /// Expired entries that the sweeper has not reached yet are removed on
    /// the spot and reported as [`CacheError::Expired`].
    pub fn get<Q>(&self, key: &Q) -> Result<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = &self.inner;
        let found = inner.shards.with_read(key, |map| {
            let slot = map.get(key)?;
            if slot.entry.is_expired() {
                return Some(Err(slot.node));
            }
            inner.list.write().move_to_front(slot.node);
            Some(Ok(Arc::clone(&slot.entry)))
        });

        match found {
            Some(Ok(entry)) => {
                inner.stats.record_hit();
                Ok(entry)
            }
            Some(Err(node)) => {
                inner.remove_if(key, Some(node), Removal::Expired);
                inner.stats.record_miss();
                Err(CacheError::Expired)
            }
            None => {
                inner.stats.record_miss();
                Err(CacheError::NotFound)
            }
        }
    }

    // == Peek ==
    /// Retrieves an entry without touching its recency position.
    ///
    /// Expired entries are reported as [`CacheError::Expired`] but left for
    /// the sweeper or the next `get`.
    pub fn peek<Q>(&self, key: &Q) -> Result<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.shards.with_read(key, |map| match map.get(key) {
            Some(slot) if slot.entry.is_expired() => Err(CacheError::Expired),
            Some(slot) => Ok(Arc::clone(&slot.entry)),
            None => Err(CacheError::NotFound),
        })
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.peek(key).is_ok()
    }

    // == Set ==
    /// Stores a value, returning true if a live entry was overwritten.
    ///
    /// Overwriting replaces the value and `last_updated` and marks the entry
    /// most recently used; its creation time and TTL are kept. A new key gets
    /// `ttl`, or the default TTL when `ttl` is None, and may push the least
    /// recently used entry out if the cache is at capacity.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL (uses the default TTL if None)
    pub fn set(&self, key: K, value: V, ttl: Option<Ttl>) -> bool {
        let inner = &self.inner;
        let (overwritten, stale) = inner.shards.with_write(&key, |map| {
            if let Some(slot) = map.get_mut(&key) {
                if !slot.entry.is_expired() {
                    let entry = Arc::new(slot.entry.with_value(value));
                    let mut list = inner.list.write();
                    list.replace(slot.node, Arc::clone(&entry));
                    list.move_to_front(slot.node);
                    slot.entry = entry;
                    return (true, None);
                }
            }

            // An expired leftover is replaced as if the key were new
            let stale = map.remove(&key).map(|slot| {
                inner.list.write().remove(slot.node);
                slot.entry
            });

            let ttl = ttl.or(inner.default_ttl).unwrap_or(Ttl::Never);
            let entry = Arc::new(Entry::new(key.clone(), value, ttl));
            let node = inner.list.write().push_front(Arc::clone(&entry));
            inner.register_expiry(&entry, node);
            map.insert(key.clone(), Slot { entry, node });

            (false, stale)
        });

        if let Some(stale) = stale {
            inner.after_removal(stale, Removal::Expired);
        }
        if !overwritten {
            inner.evict_overflow();
        }
        overwritten
    }

    // == Update ==
    /// Replaces the value of a live entry, returning whether it existed.
    ///
    /// Only the value and `last_updated` change; creation time, TTL and
    /// recency position are left alone.
    pub fn update<Q>(&self, key: &Q, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = &self.inner;
        inner.shards.with_write(key, |map| match map.get_mut(key) {
            Some(slot) if !slot.entry.is_expired() => {
                let entry = Arc::new(slot.entry.with_value(value));
                inner.list.write().replace(slot.node, Arc::clone(&entry));
                slot.entry = entry;
                true
            }
            _ => false,
        })
    }

    // == Delete ==
    /// Removes an entry, returning whether the key was present.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.remove_if(key, None, Removal::Deleted).is_some()
    }

    // == Purge ==
    /// Removes every key present when the call starts.
    ///
    /// Keys are deleted independently and in parallel; inserts racing the
    /// purge may survive it.
    pub fn purge(&self) {
        let keys: Vec<K> = {
            let list = self.inner.list.read();
            list.iter().map(|entry| entry.key().clone()).collect()
        };

        keys.par_iter().for_each(|key| {
            self.inner.remove_if(key, None, Removal::Deleted);
        });
        debug!(keys = keys.len(), "Purged cache");
    }

    // == Resize ==
    /// Changes the capacity, evicting least recently used entries as needed.
    ///
    /// A capacity of 0 makes the cache unbounded.
    pub fn resize(&self, capacity: usize) {
        self.inner.capacity.store(capacity, Ordering::Release);
        self.inner.evict_overflow();
    }

    // == Recover ==
    /// Replaces the whole cache content with `entries`.
    ///
    /// `entries` is read as a recency order, most recently used first (the
    /// order [`LruCache::entries`] produces). Timestamps, TTLs and metadata
    /// are kept as given. Already-expired entries are skipped, a repeated key
    /// keeps its last occurrence, and entries beyond capacity are dropped from
    /// the least recently used end. No eviction callbacks fire.
    ///
    /// The swap is atomic: no caller observes a mix of old and new content.
    pub fn recover(&self, entries: Vec<Entry<K, V>>) {
        let inner = &self.inner;
        let now = Utc::now();
        let offered = entries.len();

        let mut seen = HashSet::new();
        let mut fresh: Vec<Entry<K, V>> = entries
            .into_iter()
            .rev()
            .filter(|entry| !entry.is_expired_at(now))
            .filter(|entry| seen.insert(entry.key().clone()))
            .collect();
        fresh.reverse();

        let capacity = inner.capacity.load(Ordering::Acquire);
        if capacity > 0 && fresh.len() > capacity {
            fresh.truncate(capacity);
        }
        let restored = fresh.len();

        inner.shards.with_all_write(|shards| {
            let mut list = inner.list.write();
            shards.clear();
            list.clear();
            inner.expiry.clear();

            // Push back-to-front so the first entry ends up most recent
            for entry in fresh.into_iter().rev() {
                let entry = Arc::new(entry);
                let node = list.push_front(Arc::clone(&entry));
                inner.register_expiry(&entry, node);
                shards.insert(entry.key().clone(), Slot { entry, node });
            }
        });

        debug!(offered, restored, "Recovered cache state");
    }

    // == Snapshots ==
    /// Keys of live entries, most recently used first.
    pub fn keys(&self) -> Vec<K> {
        let now = Utc::now();
        let list = self.inner.list.read();
        list.iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Live entries, most recently used first.
    pub fn entries(&self) -> Vec<Arc<Entry<K, V>>> {
        let now = Utc::now();
        let list = self.inner.list.read();
        list.iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(Arc::clone)
            .collect()
    }

    // == Size ==
    /// Number of entries held, including expired ones not yet removed.
    pub fn size(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Configured capacity, 0 = unbounded.
    pub fn cap(&self) -> usize {
        self.inner.capacity.load(Ordering::Acquire)
    }

    pub fn default_ttl(&self) -> Option<Ttl> {
        self.inner.default_ttl
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.size())
    }

    /// Runs one expiry sweep immediately, returning the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep()
    }

    /// Number of key-space shards currently in use.
    pub fn shard_count(&self) -> usize {
        self.inner.shards.shard_count()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn cache(capacity: usize) -> LruCache<String, String> {
        LruCache::new(CacheConfig {
            capacity,
            ..CacheConfig::default()
        })
        .unwrap()
    }

    fn set(cache: &LruCache<String, String>, key: &str, value: &str) -> bool {
        cache.set(key.to_string(), value.to_string(), None)
    }

    /// Map and list must agree: same size, no duplicate keys, every listed key reachable.
    fn assert_consistent(cache: &LruCache<String, String>) {
        let listed: Vec<String> = {
            let list = cache.inner.list.read();
            list.iter().map(|e| e.key().clone()).collect()
        };
        let unique: HashSet<_> = listed.iter().collect();
        assert_eq!(unique.len(), listed.len(), "duplicate key in recency list");
        assert_eq!(cache.inner.shards.len(), listed.len(), "map and list disagree");
        for key in &listed {
            assert!(cache.inner.shards.with_read(key.as_str(), |m| m.contains_key(key.as_str())));
        }
    }

    #[test]
    fn test_store_new() {
        let cache = cache(100);
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.cap(), 100);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let cache = cache(100);

        assert!(!set(&cache, "key1", "value1"));
        let entry = cache.get("key1").unwrap();

        assert_eq!(entry.value(), "value1");
        assert_eq!(entry.key(), "key1");
        assert_eq!(entry.ttl(), Ttl::Never);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let cache = cache(100);

        assert_eq!(cache.get("nonexistent").unwrap_err(), CacheError::NotFound);
        assert_eq!(cache.peek("nonexistent").unwrap_err(), CacheError::NotFound);
    }

    #[test]
    fn test_store_delete() {
        let cache = cache(100);

        set(&cache, "key1", "value1");
        assert!(cache.delete("key1"));
        assert!(!cache.delete("key1"));

        assert!(cache.is_empty());
        assert_eq!(cache.get("key1").unwrap_err(), CacheError::NotFound);
        assert_consistent(&cache);
    }

    #[test]
    fn test_store_overwrite() {
        let cache = cache(100);

        assert!(!set(&cache, "key1", "value1"));
        let first = cache.peek("key1").unwrap();
        sleep(Duration::from_millis(5));
        assert!(set(&cache, "key1", "value2"));

        let second = cache.get("key1").unwrap();
        assert_eq!(second.value(), "value2");
        assert_eq!(second.creation_time(), first.creation_time());
        assert!(second.last_updated() > first.last_updated());
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_store_lru_eviction() {
        let cache = cache(3);

        set(&cache, "key1", "value1");
        set(&cache, "key2", "value2");
        set(&cache, "key3", "value3");

        // Cache is full, adding key4 should evict key1 (oldest)
        set(&cache, "key4", "value4");

        assert_eq!(cache.size(), 3);
        assert_eq!(cache.get("key1").unwrap_err(), CacheError::NotFound);
        assert!(cache.get("key2").is_ok());
        assert!(cache.get("key3").is_ok());
        assert!(cache.get("key4").is_ok());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let cache = cache(2);

        set(&cache, "a", "1");
        set(&cache, "b", "2");
        cache.get("a").unwrap();
        set(&cache, "c", "3");

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert_eq!(cache.keys(), vec!["c".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_overwrite_moves_to_front() {
        let cache = cache(2);

        set(&cache, "a", "1");
        set(&cache, "b", "2");
        set(&cache, "a", "1b");
        set(&cache, "c", "3");

        assert_eq!(cache.keys(), vec!["c".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_peek_does_not_touch() {
        let cache = cache(2);

        set(&cache, "a", "1");
        set(&cache, "b", "2");
        cache.peek("a").unwrap();
        set(&cache, "c", "3");

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_update_preserves_ttl_and_position() {
        let cache = cache(2);

        cache.set("a".into(), "1".into(), Some(Ttl::After(Duration::from_secs(60))));
        set(&cache, "b", "2");
        let before = cache.peek("a").unwrap();

        sleep(Duration::from_millis(5));
        assert!(cache.update("a", "updated".to_string()));
        assert!(!cache.update("missing", "x".to_string()));

        let after = cache.peek("a").unwrap();
        assert_eq!(after.value(), "updated");
        assert_eq!(after.creation_time(), before.creation_time());
        assert_eq!(after.ttl(), before.ttl());
        assert!(after.last_updated() > before.last_updated());

        // Still least recently used, so it goes first
        set(&cache, "c", "3");
        assert!(!cache.contains("a"));
        assert!(!cache.contains("missing"));
    }

    #[test]
    fn test_store_ttl_expiration() {
        let cache = cache(100);

        cache.set("key1".into(), "value1".into(), Some(Ttl::After(Duration::from_millis(50))));
        assert!(cache.get("key1").is_ok());

        sleep(Duration::from_millis(80));

        assert_eq!(cache.peek("key1").unwrap_err(), CacheError::Expired);
        assert!(cache.keys().is_empty());
        assert_eq!(cache.get("key1").unwrap_err(), CacheError::Expired);

        // Lazily removed by the failed get
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.get("key1").unwrap_err(), CacheError::NotFound);
        assert_eq!(cache.stats().expirations, 1);
        assert_consistent(&cache);
    }

    #[test]
    fn test_set_over_expired_entry_starts_fresh() {
        let cache = cache(100);

        cache.set("k".into(), "old".into(), Some(Ttl::After(Duration::from_millis(20))));
        sleep(Duration::from_millis(40));

        assert!(!cache.set("k".into(), "new".into(), None));
        let entry = cache.get("k").unwrap();
        assert_eq!(entry.value(), "new");
        assert_eq!(entry.ttl(), Ttl::Never);
        assert_consistent(&cache);
    }

    #[test]
    fn test_resize_evicts_from_tail() {
        let cache = cache(0);

        for key in ["a", "b", "c", "d", "e"] {
            set(&cache, key, key);
        }
        cache.resize(2);

        assert_eq!(cache.cap(), 2);
        assert_eq!(cache.keys(), vec!["e".to_string(), "d".to_string()]);
        assert_eq!(cache.stats().evictions, 3);
        assert_consistent(&cache);
    }

    #[test]
    fn test_purge() {
        let cache = cache(0);

        for i in 0..500 {
            set(&cache, &format!("key{i}"), "v");
        }
        cache.purge();

        assert_eq!(cache.size(), 0);
        assert!(cache.keys().is_empty());
        assert_consistent(&cache);
    }

    #[test]
    fn test_recover_replaces_content() {
        let cache = cache(0);
        set(&cache, "old", "x");

        let snapshot = vec![
            Entry::new("a".to_string(), "1".to_string(), Ttl::Never),
            Entry::new("b".to_string(), "2".to_string(), Ttl::After(Duration::from_secs(60))),
        ];
        cache.recover(snapshot);

        assert_eq!(cache.keys(), vec!["a".to_string(), "b".to_string()]);
        assert!(!cache.contains("old"));
        assert_consistent(&cache);
    }

    #[test]
    fn test_recover_skips_expired_and_duplicates() {
        let cache = cache(0);
        let long_ago = Utc::now() - chrono::Duration::seconds(120);

        cache.recover(vec![
            Entry::new("a".to_string(), "first".to_string(), Ttl::Never),
            Entry::new("gone".to_string(), "x".to_string(), Ttl::After(Duration::from_secs(60)))
                .with_creation_time(long_ago),
            Entry::new("a".to_string(), "second".to_string(), Ttl::Never),
        ]);

        assert_eq!(cache.keys(), vec!["a".to_string()]);
        assert_eq!(cache.get("a").unwrap().value(), "second");
    }

    #[test]
    fn test_recover_respects_capacity() {
        let cache = cache(2);

        cache.recover(
            ["a", "b", "c"]
                .into_iter()
                .map(|k| Entry::new(k.to_string(), k.to_string(), Ttl::Never))
                .collect(),
        );

        assert_eq!(cache.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_recover_preserves_timestamps() {
        let cache = cache(0);
        let created = Utc::now() - chrono::Duration::seconds(10);
        let entry = Entry::new("a".to_string(), "1".to_string(), Ttl::After(Duration::from_secs(60)))
            .with_creation_time(created);

        cache.recover(vec![entry]);

        let restored = cache.peek("a").unwrap();
        assert_eq!(restored.creation_time(), created);
        let remaining = restored.ttl_remaining().duration().unwrap();
        assert!(remaining <= Duration::from_secs(50));
    }

    #[test]
    fn test_sweep_without_sweeper_leaves_index_empty() {
        let cache = cache(0);

        cache.set("a".into(), "1".into(), Some(Ttl::After(Duration::from_millis(1))));

        assert!(cache.inner.expiry.is_empty());
        assert_eq!(cache.sweep_expired(), 0);
    }

    #[test]
    fn test_stats_counts_hits_and_misses() {
        let cache = cache(100);

        set(&cache, "key1", "value1");
        cache.get("key1").unwrap();
        let _ = cache.get("nonexistent");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_eviction_skips_tail_touched_after_read() {
        let cache = cache(0);
        set(&cache, "a", "1");
        set(&cache, "b", "2");

        let (node, tail) = {
            let list = cache.inner.list.read();
            let (node, entry) = list.back().unwrap();
            (node, entry.key().clone())
        };
        assert_eq!(tail, "a");

        // Touched between reading the tail and removing it
        cache.get("a").unwrap();
        assert!(cache.inner.remove_if("a", Some(node), Removal::Evicted).is_none());
        assert!(cache.contains("a"));

        cache.resize(1);
        assert_eq!(cache.keys(), vec!["a".to_string()]);
        assert_eq!(cache.stats().evictions, 1);
        assert_consistent(&cache);
    }

    #[test]
    fn test_debug_output() {
        let cache = cache(10);
        set(&cache, "a", "1");

        let debug = format!("{cache:?}");
        assert!(debug.contains("size: 1"));
        assert!(debug.contains("capacity: 10"));
        assert!(debug.contains("shards: 16"));
    }

    #[test]
    fn test_borrowed_lookup() {
        let cache: LruCache<String, u64> = LruCache::new(CacheConfig::default()).unwrap();

        cache.set("answer".to_string(), 42, None);

        assert_eq!(*cache.get("answer").unwrap().value(), 42);
        assert!(cache.delete("answer"));
    }
}
