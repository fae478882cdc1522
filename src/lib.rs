//! LRU TTL Cache - An embeddable concurrent in-memory cache
//!
//! Provides LRU eviction and bucketed TTL expiry over a lock-striped key
//! space, safe for use from many threads at once.

pub mod cache;
pub mod config;
pub mod error;
pub mod locks;
pub mod tasks;

pub use cache::{CacheBuilder, CacheStats, Entry, LruCache, Ttl};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::EvictionCallback;
