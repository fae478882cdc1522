//! Cache Builder Module
//!
//! Construction-time options for [`LruCache`].

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::info;

use crate::cache::store::{CacheInner, LruCache};
use crate::cache::{Entry, Ttl};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_eviction_listener, spawn_sweeper, EvictionCallback};

// == Cache Builder ==
/// Collects options and builds an [`LruCache`].
///
/// Background tasks are spawned on the current Tokio runtime:
/// - a sweeper, when the default TTL is finite
/// - an eviction listener, when a callback is registered
///
/// Asking for either outside a runtime is a configuration error.
///
/// # Example
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
/// let cache = LruCache::<String, Vec<u8>>::builder()
///     .capacity(10_000)
///     .default_ttl(Ttl::After(Duration::from_secs(300)))
///     .on_evict(|key, _value| tracing::debug!(%key, "evicted"))
///     .shutdown(shutdown_rx)
///     .build()?;
/// // Later, during shutdown:
/// shutdown_tx.send(true)?;
/// ```
pub struct CacheBuilder<K, V> {
    config: CacheConfig,
    on_evict: Option<EvictionCallback<K, V>>,
    initial_state: Vec<Entry<K, V>>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<K, V> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self {
            config: CacheConfig::default(),
            on_evict: None,
            initial_state: Vec::new(),
            shutdown: None,
        }
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every configurable setting at once.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Bounds the live entry count; 0 means unbounded.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// TTL for entries set without one. `Ttl::Never` disables expiry.
    pub fn default_ttl(mut self, ttl: Ttl) -> Self {
        self.config.default_ttl = Some(ttl);
        self
    }

    pub fn bucket_width(mut self, width: Duration) -> Self {
        self.config.bucket_width = width;
        self
    }

    pub fn shards(mut self, initial: usize, max: usize) -> Self {
        self.config.initial_shards = initial;
        self.config.max_shards = max;
        self
    }

    pub fn notify_on_expire(mut self, notify: bool) -> Self {
        self.config.notify_on_expire = notify;
        self
    }

    /// Registers a callback for capacity evictions (and TTL removals when
    /// `notify_on_expire` is set). It runs asynchronously and never blocks
    /// the operation that caused the removal.
    pub fn on_evict<F>(mut self, callback: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.on_evict = Some(Arc::new(callback));
        self
    }

    /// Entries loaded at construction, as if passed to [`LruCache::recover`].
    pub fn initial_state(mut self, entries: Vec<Entry<K, V>>) -> Self {
        self.initial_state = entries;
        self
    }

    /// Cancellation signal for the sweeper; sending `true` stops it.
    pub fn shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    // == Build ==
    /// Validates the configuration, spawns background tasks and builds the cache.
    pub fn build(self) -> Result<LruCache<K, V>> {
        let config = self.config;
        config.validate()?;

        let sweeping = config.expires_by_default();
        let runtime = if sweeping || self.on_evict.is_some() {
            Some(Handle::try_current().map_err(|_| {
                CacheError::Configuration(
                    "a default TTL or eviction callback needs a running Tokio runtime".to_string(),
                )
            })?)
        } else {
            None
        };

        let notifier = match (&runtime, self.on_evict) {
            (Some(handle), Some(callback)) => {
                let (notifier, _listener) = spawn_eviction_listener(handle, callback);
                Some(notifier)
            }
            _ => None,
        };

        let inner = Arc::new(CacheInner::new(&config, sweeping, notifier));

        if let (true, Some(handle)) = (sweeping, &runtime) {
            let _sweeper =
                spawn_sweeper(handle, Arc::downgrade(&inner), config.bucket_width, self.shutdown);
        }

        let cache = LruCache::from_inner(inner);
        if !self.initial_state.is_empty() {
            cache.recover(self.initial_state);
        }

        info!(
            capacity = config.capacity,
            sweeping,
            shards = config.initial_shards,
            "Cache initialized"
        );
        Ok(cache)
    }
}
