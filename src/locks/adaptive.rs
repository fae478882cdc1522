//! Adaptive key-space lock manager
//!
//! Shards the key-value map across `parking_lot::RwLock`s and doubles the
//! shard count as the number of stored keys grows.
//!
//! # Locking
//! The shard table sits behind a top-level `RwLock`. Every per-key access
//! holds it shared for the duration of the shard access; growth and
//! [`AdaptiveLock::with_all_write`] hold it exclusively. Growth therefore
//! waits for every in-flight shard holder to release before rehashing, and
//! no shard is ever mutated under a reader of the old table.

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use super::stripe_index;

/// Average keys per shard tolerated before the table doubles.
pub const DEFAULT_KEYS_PER_SHARD: usize = 128;

type Shard<K, V> = RwLock<HashMap<K, V>>;

// == Adaptive Lock ==
/// Key-space lock manager whose shards own the map slots they guard.
#[derive(Debug)]
pub struct AdaptiveLock<K, V> {
    table: RwLock<Vec<Shard<K, V>>>,
    hasher: RandomState,
    len: AtomicUsize,
    max_shards: usize,
    keys_per_shard: usize,
}

impl<K, V> AdaptiveLock<K, V>
where
    K: Hash + Eq,
{
    /// Creates a manager starting at `initial_shards` and growing up to `max_shards`.
    pub fn new(initial_shards: usize, max_shards: usize) -> Self {
        Self::with_load_factor(initial_shards, max_shards, DEFAULT_KEYS_PER_SHARD)
    }

    pub fn with_load_factor(initial_shards: usize, max_shards: usize, keys_per_shard: usize) -> Self {
        let initial = initial_shards.max(1);
        let table = (0..initial).map(|_| RwLock::new(HashMap::new())).collect();

        Self {
            table: RwLock::new(table),
            hasher: RandomState::new(),
            len: AtomicUsize::new(0),
            max_shards: max_shards.max(initial),
            keys_per_shard: keys_per_shard.max(1),
        }
    }

    // == Shard Access ==
    /// Runs `f` with shared access to the shard owning `key`.
    pub fn with_read<Q, R>(&self, key: &Q, f: impl FnOnce(&HashMap<K, V>) -> R) -> R
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let table = self.table.read();
        let shard = table[self.index(key, table.len())].read();
        f(&shard)
    }

    /// Runs `f` with exclusive access to the shard owning `key`.
    ///
    /// May grow the shard table after `f` returns and every lock is released.
    pub fn with_write<Q, R>(&self, key: &Q, f: impl FnOnce(&mut HashMap<K, V>) -> R) -> R
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (result, grew) = {
            let table = self.table.read();
            let mut shard = table[self.index(key, table.len())].write();

            let before = shard.len();
            let result = f(&mut shard);
            let after = shard.len();

            let len = if after >= before {
                self.len.fetch_add(after - before, Ordering::AcqRel) + (after - before)
            } else {
                self.len.fetch_sub(before - after, Ordering::AcqRel) - (before - after)
            };
            (result, after > before && self.over_loaded(len, table.len()))
        };

        if grew {
            self.grow();
        }
        result
    }

    /// Runs `f` with every shard held exclusively.
    pub fn with_all_write<R>(&self, f: impl FnOnce(&mut AllShards<'_, K, V>) -> R) -> R {
        let mut table = self.table.write();
        let result = {
            let mut all = AllShards {
                shards: table.as_mut_slice(),
                hasher: &self.hasher,
                len: &self.len,
            };
            f(&mut all)
        };
        self.grow_locked(&mut table);
        result
    }

    // == Introspection ==
    /// Number of keys stored across all shards.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shard_count(&self) -> usize {
        self.table.read().len()
    }

    // == Growth ==
    fn index<Q: Hash + ?Sized>(&self, key: &Q, count: usize) -> usize {
        stripe_index(self.hasher.hash_one(key), count)
    }

    fn over_loaded(&self, len: usize, shards: usize) -> bool {
        shards < self.max_shards && len > shards * self.keys_per_shard
    }

    fn grow(&self) {
        let mut table = self.table.write();
        self.grow_locked(&mut table);
    }

    fn grow_locked(&self, table: &mut Vec<Shard<K, V>>) {
        let len = self.len();
        let mut count = table.len();
        while self.over_loaded(len, count) {
            count = (count * 2).min(self.max_shards);
        }
        if count == table.len() {
            return;
        }

        let mut fresh: Vec<HashMap<K, V>> = (0..count).map(|_| HashMap::new()).collect();
        for shard in table.drain(..) {
            for (key, value) in shard.into_inner() {
                let index = self.index(&key, count);
                fresh[index].insert(key, value);
            }
        }
        table.extend(fresh.into_iter().map(RwLock::new));

        debug!(shards = count, keys = len, "Grew key-space shard table");
    }
}

// == All Shards ==
/// Exclusive view over every shard, handed out by [`AdaptiveLock::with_all_write`].
pub struct AllShards<'a, K, V> {
    shards: &'a mut [Shard<K, V>],
    hasher: &'a RandomState,
    len: &'a AtomicUsize,
}

impl<K: Hash + Eq, V> AllShards<'_, K, V> {
    pub fn clear(&mut self) {
        for shard in self.shards.iter_mut() {
            shard.get_mut().clear();
        }
        self.len.store(0, Ordering::Release);
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let index = stripe_index(self.hasher.hash_one(&key), self.shards.len());
        let previous = self.shards[index].get_mut().insert(key, value);
        if previous.is_none() {
            self.len.fetch_add(1, Ordering::AcqRel);
        }
        previous
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = stripe_index(self.hasher.hash_one(key), self.shards.len());
        let removed = self.shards[index].get_mut().remove(key);
        if removed.is_some() {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
