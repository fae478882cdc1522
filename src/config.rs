//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::Ttl;
use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of live entries, 0 = unbounded
    pub capacity: usize,
    /// TTL applied to entries set without one; None = entries persist
    pub default_ttl: Option<Ttl>,
    /// Granularity of the expiry index and sweep interval
    pub bucket_width: Duration,
    /// Key-space shards created up front (growth floor)
    pub initial_shards: usize,
    /// Upper bound on key-space shard growth
    pub max_shards: usize,
    /// Lock stripes over the expiry index
    pub expiry_stripes: usize,
    /// Also notify the eviction callback when the TTL removes an entry
    pub notify_on_expire: bool,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 0, unbounded)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in ms; negative = never expires (default: unset)
    /// - `CACHE_BUCKET_WIDTH_MS` - Expiry bucket width in ms (default: 1000)
    /// - `CACHE_SHARDS` - Initial key-space shards (default: 16)
    /// - `CACHE_MAX_SHARDS` - Maximum key-space shards (default: 1024)
    /// - `CACHE_EXPIRY_STRIPES` - Expiry index lock stripes (default: 16)
    /// - `CACHE_NOTIFY_ON_EXPIRE` - Notify on TTL removal (default: false)
    ///
    /// Unparseable or negative values are rejected rather than defaulted.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`CacheConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let capacity = match parse::<i64>(&lookup, "CACHE_CAPACITY")? {
            Some(cap) if cap < 0 => {
                return Err(CacheError::Configuration(format!(
                    "CACHE_CAPACITY must not be negative, got {cap}"
                )))
            }
            Some(cap) => usize::try_from(cap).map_err(|_| {
                CacheError::Configuration(format!("CACHE_CAPACITY out of range: {cap}"))
            })?,
            None => defaults.capacity,
        };

        let default_ttl = parse::<i64>(&lookup, "CACHE_DEFAULT_TTL_MS")?
            .and_then(Ttl::from_millis_signed)
            .or(defaults.default_ttl);

        let bucket_width = parse::<u64>(&lookup, "CACHE_BUCKET_WIDTH_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.bucket_width);

        let config = Self {
            capacity,
            default_ttl,
            bucket_width,
            initial_shards: parse(&lookup, "CACHE_SHARDS")?.unwrap_or(defaults.initial_shards),
            max_shards: parse(&lookup, "CACHE_MAX_SHARDS")?.unwrap_or(defaults.max_shards),
            expiry_stripes: parse(&lookup, "CACHE_EXPIRY_STRIPES")?
                .unwrap_or(defaults.expiry_stripes),
            notify_on_expire: parse(&lookup, "CACHE_NOTIFY_ON_EXPIRE")?
                .unwrap_or(defaults.notify_on_expire),
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_width.as_millis() == 0 {
            return Err(CacheError::Configuration(
                "bucket width must be at least 1ms".to_string(),
            ));
        }
        if self.initial_shards == 0 {
            return Err(CacheError::Configuration(
                "initial shard count must be non-zero".to_string(),
            ));
        }
        if self.max_shards < self.initial_shards {
            return Err(CacheError::Configuration(format!(
                "max shards ({}) below initial shards ({})",
                self.max_shards, self.initial_shards
            )));
        }
        if self.expiry_stripes == 0 {
            return Err(CacheError::Configuration(
                "expiry stripe count must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// True when a default TTL would actually expire entries.
    pub fn expires_by_default(&self) -> bool {
        self.default_ttl.is_some_and(|ttl| ttl.is_finite())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            default_ttl: None,
            bucket_width: Duration::from_secs(1),
            initial_shards: 16,
            max_shards: 1024,
            expiry_stripes: 16,
            notify_on_expire: false,
        }
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CacheError::Configuration(format!("{name}: cannot parse {raw:?}"))),
    }
}
