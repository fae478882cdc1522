//! Background Tasks Module
//!
//! Contains the background tasks a cache may run alongside its callers.
//!
//! # Tasks
//! - TTL Sweeper: removes entries whose expiry bucket has elapsed
//! - Eviction Listener: runs the eviction callback off the caller's thread

mod notifier;
mod sweeper;

pub use notifier::EvictionCallback;
pub(crate) use notifier::{spawn_eviction_listener, Notifier};
pub use sweeper::{spawn_sweeper, Sweep};
