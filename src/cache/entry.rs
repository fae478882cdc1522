//! Cache Entry Module
//!
//! Defines individual cache entries and the TTL type attached to them.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Time To Live ==
/// Lifetime of an entry, measured from its creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ttl {
    /// Never expires
    Never,
    /// Expires once this much time has passed since creation
    After(Duration),
}

impl Ttl {
    /// Builds a TTL from a signed millisecond count.
    ///
    /// Negative values are the "never expires" sentinel, zero means unset.
    pub fn from_millis_signed(ms: i64) -> Option<Ttl> {
        match ms {
            ms if ms < 0 => Some(Ttl::Never),
            0 => None,
            ms => Some(Ttl::After(Duration::from_millis(ms as u64))),
        }
    }

    /// Returns the duration for a finite TTL.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Ttl::Never => None,
            Ttl::After(d) => Some(*d),
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Ttl::After(_))
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Ttl::After(d)
    }
}

// == Cache Entry ==
/// A single cached record.
///
/// Entries are immutable once they are inside a cache; a value mutation
/// publishes a fresh entry that keeps the key, creation time, TTL and
/// metadata of the one it replaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<K, V> {
    key: K,
    value: V,
    creation_time: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    ttl: Ttl,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, Value>,
}

impl<K, V> Entry<K, V> {
    // == Constructor ==
    /// Creates an entry stamped with the current time.
    ///
    /// # Arguments
    /// * `key` - The key to store under
    /// * `value` - The payload
    /// * `ttl` - Lifetime measured from now
    pub fn new(key: K, value: V, ttl: Ttl) -> Self {
        let now = Utc::now();
        Self {
            key,
            value,
            creation_time: now,
            last_updated: now,
            ttl,
            metadata: BTreeMap::new(),
        }
    }

    /// Overrides the creation time, e.g. when rebuilding a snapshot.
    ///
    /// `last_updated` is pulled forward if it would precede creation.
    pub fn with_creation_time(mut self, creation_time: DateTime<Utc>) -> Self {
        self.creation_time = creation_time;
        if self.last_updated < creation_time {
            self.last_updated = creation_time;
        }
        self
    }

    pub fn with_last_updated(mut self, last_updated: DateTime<Utc>) -> Self {
        self.last_updated = last_updated;
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn insert_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    // == Accessors ==
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// The TTL captured at creation.
    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Returns `creation_time + ttl`, or None for entries that never expire.
    ///
    /// A TTL too large to represent as a timestamp is treated as never.
    pub fn expiry_time(&self) -> Option<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(self.ttl.duration()?).ok()?;
        self.creation_time.checked_add_signed(ttl)
    }

    // == Time To Live ==
    /// Returns the remaining TTL.
    ///
    /// # Returns
    /// - `Ttl::Never` unchanged for entries that never expire
    /// - `Ttl::After(Duration::ZERO)` once the TTL has elapsed
    /// - `Ttl::After(remaining)` otherwise
    pub fn ttl_remaining(&self) -> Ttl {
        self.ttl_remaining_at(Utc::now())
    }

    pub fn ttl_remaining_at(&self, now: DateTime<Utc>) -> Ttl {
        match self.ttl {
            Ttl::Never => Ttl::Never,
            Ttl::After(ttl) => {
                // Clock skew can put `now` before creation; count that as no time elapsed.
                let elapsed = (now - self.creation_time).to_std().unwrap_or_default();
                Ttl::After(ttl.saturating_sub(elapsed))
            }
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired when the current time is
    /// greater than or equal to its expiry time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry_time() {
            Some(expires) => now >= expires,
            None => false,
        }
    }
}

impl<K: Clone, V> Entry<K, V> {
    /// Copy of this entry carrying a new value and a fresh `last_updated`.
    pub(crate) fn with_value(&self, value: V) -> Self {
        Self {
            key: self.key.clone(),
            value,
            creation_time: self.creation_time,
            last_updated: Utc::now(),
            ttl: self.ttl,
            metadata: self.metadata.clone(),
        }
    }
}
