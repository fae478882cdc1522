//! Fixed-size striped lock
//!
//! Each stripe is a `parking_lot::RwLock` owning its share of the data.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::stripe_index;

// == Striped Lock ==
/// A fixed array of read-write locks addressed by hashing an id.
///
/// Two ids may land on the same stripe; a given id always lands on the same
/// stripe for the lifetime of the lock.
#[derive(Debug)]
pub struct StripedLock<T> {
    stripes: Box<[RwLock<T>]>,
    hasher: RandomState,
}

impl<T: Default> StripedLock<T> {
    /// Creates `count` stripes (at least one), each holding `T::default()`.
    pub fn new(count: usize) -> Self {
        let stripes = (0..count.max(1))
            .map(|_| RwLock::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            stripes,
            hasher: RandomState::new(),
        }
    }
}

impl<T> StripedLock<T> {
    /// Returns the stripe responsible for `id`.
    pub fn stripe<Q: Hash + ?Sized>(&self, id: &Q) -> &RwLock<T> {
        let index = stripe_index(self.hasher.hash_one(id), self.stripes.len());
        &self.stripes[index]
    }

    pub fn read<Q: Hash + ?Sized>(&self, id: &Q) -> RwLockReadGuard<'_, T> {
        self.stripe(id).read()
    }

    pub fn write<Q: Hash + ?Sized>(&self, id: &Q) -> RwLockWriteGuard<'_, T> {
        self.stripe(id).write()
    }

    /// All stripes, for whole-structure passes such as sweeps.
    pub fn stripes(&self) -> impl Iterator<Item = &RwLock<T>> {
        self.stripes.iter()
    }

    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }
}
