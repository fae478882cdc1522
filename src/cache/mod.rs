//! Cache Module
//!
//! Provides concurrent in-memory caching with LRU eviction and bucketed TTL
//! expiry.

mod builder;
mod entry;
mod expiry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use builder::CacheBuilder;
pub use entry::{Entry, Ttl};
pub use expiry::{ExpiryIndex, ExpiryRecord};
pub use lru::{NodeId, RecencyList};
pub use stats::CacheStats;
pub use store::LruCache;
