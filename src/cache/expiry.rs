//! Expiry Index Module
//!
//! Groups entries by the time bucket their TTL runs out in, so a sweep only
//! touches buckets that have fully elapsed instead of scanning the cache.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::lru::NodeId;
use crate::locks::StripedLock;

// == Expiry Record ==
/// A pointer from a bucket back to the entry that was registered in it.
///
/// Records are never pulled out of a bucket when their entry is updated or
/// deleted; `node` lets the sweep recognise a record that has gone stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryRecord<K> {
    pub key: K,
    pub node: NodeId,
}

type Buckets<K> = HashMap<i64, Vec<ExpiryRecord<K>>>;

// == Expiry Index ==
/// Bucket id to registered entries, striped by bucket id.
///
/// A bucket id is `unix_millis / bucket_width`. Bucket `b` covers
/// `[b * width, (b + 1) * width)` and counts as elapsed once `now` reaches
/// its end.
#[derive(Debug)]
pub struct ExpiryIndex<K> {
    buckets: StripedLock<Buckets<K>>,
    bucket_width_ms: i64,
}

impl<K> ExpiryIndex<K> {
    /// Creates an index with the given bucket granularity and stripe count.
    pub fn new(bucket_width: Duration, stripes: usize) -> Self {
        let bucket_width_ms = i64::try_from(bucket_width.as_millis())
            .unwrap_or(i64::MAX)
            .max(1);

        Self {
            buckets: StripedLock::new(stripes),
            bucket_width_ms,
        }
    }

    pub fn bucket_width(&self) -> Duration {
        Duration::from_millis(self.bucket_width_ms as u64)
    }

    /// Returns the bucket id containing `time`.
    pub fn bucket_of(&self, time: DateTime<Utc>) -> i64 {
        time.timestamp_millis().div_euclid(self.bucket_width_ms)
    }

    // == Insert ==
    /// Registers an entry under the bucket its expiry time falls in.
    pub fn insert(&self, expiry_time: DateTime<Utc>, key: K, node: NodeId) {
        let bucket = self.bucket_of(expiry_time);
        self.buckets
            .write(&bucket)
            .entry(bucket)
            .or_default()
            .push(ExpiryRecord { key, node });
    }

    // == Drain ==
    /// Removes and returns every record in buckets that have fully elapsed at `now`.
    ///
    /// Each stripe is locked in turn and released before moving on.
    pub fn drain_elapsed(&self, now: DateTime<Utc>) -> Vec<ExpiryRecord<K>> {
        let current = self.bucket_of(now);
        let mut drained = Vec::new();

        for stripe in self.buckets.stripes() {
            let mut buckets = stripe.write();
            let elapsed: Vec<i64> = buckets.keys().copied().filter(|b| *b < current).collect();
            for bucket in elapsed {
                if let Some(records) = buckets.remove(&bucket) {
                    drained.extend(records);
                }
            }
        }

        drained
    }

    pub fn clear(&self) {
        for stripe in self.buckets.stripes() {
            stripe.write().clear();
        }
    }

    /// Number of records held, stale ones included.
    pub fn len(&self) -> usize {
        self.buckets
            .stripes()
            .map(|stripe| stripe.read().values().map(Vec::len).sum::<usize>())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of non-empty buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.stripes().map(|stripe| stripe.read().len()).sum()
    }
}
