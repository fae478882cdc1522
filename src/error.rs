//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key not found in cache
    #[error("key not found")]
    NotFound,

    /// Key is still present but its TTL has elapsed
    #[error("key expired")]
    Expired,

    /// Over capacity with nothing left to evict
    #[error("capacity violation: {0}")]
    CapacityViolation(String),

    /// Rejected at construction time
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Returns true for the two "absent" outcomes a caller sees on lookup.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::NotFound | CacheError::Expired)
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
