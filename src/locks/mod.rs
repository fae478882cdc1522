//! Lock Striping Module
//!
//! Spreads lock contention over several independently locked stripes.
//!
//! # Managers
//! - [`AdaptiveLock`]: key-space shards owning a slice of the key-value map,
//!   doubling the shard count as the number of stored keys grows
//! - [`StripedLock`]: fixed stripe array addressed by any hashable id,
//!   used for the expiry-bucket index

mod adaptive;
mod striped;

pub use adaptive::{AdaptiveLock, AllShards, DEFAULT_KEYS_PER_SHARD};
pub use striped::StripedLock;

/// Maps a hash onto one of `count` stripes.
#[inline]
fn stripe_index(hash: u64, count: usize) -> usize {
    (hash % count as u64) as usize
}
