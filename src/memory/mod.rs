//! Memory Tier
//!
//! In-memory stores keyed by [`HashKey`], holding encoded values as
//! [`Bytes`] so one tier can serve values of any type.

mod bounded;
mod unbounded;

pub use bounded::BoundedStore;
pub use unbounded::UnboundedStore;

use bytes::Bytes;

use crate::capacity::Capacity;
use crate::key::HashKey;
use crate::store::CacheStore;

/// The memory tier of a [`TieredCache`](crate::tiered::TieredCache)
pub enum MemoryTier {
    Unbounded(UnboundedStore),
    Bounded(BoundedStore),
}

impl MemoryTier {
    /// Bounded when a capacity is given, unbounded otherwise
    pub fn new(capacity: Option<Capacity>) -> Self {
        match capacity {
            Some(capacity) => MemoryTier::Bounded(BoundedStore::new(capacity)),
            None => MemoryTier::Unbounded(UnboundedStore::new()),
        }
    }

    /// Insert an entry; returns how many entries eviction removed
    pub fn insert(&self, key: HashKey, value: Bytes) -> usize {
        match self {
            MemoryTier::Unbounded(store) => {
                store.insert(key, value);
                0
            }
            MemoryTier::Bounded(store) => store.insert(key, value),
        }
    }

    /// True when a bounded tier is over budget
    pub fn is_saturated(&self) -> bool {
        match self {
            MemoryTier::Unbounded(_) => false,
            MemoryTier::Bounded(store) => store.is_saturated(),
        }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, MemoryTier::Bounded(_))
    }

    pub fn len(&self) -> usize {
        match self {
            MemoryTier::Unbounded(store) => store.len(),
            MemoryTier::Bounded(store) => store.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evictions(&self) -> u64 {
        match self {
            MemoryTier::Unbounded(_) => 0,
            MemoryTier::Bounded(store) => store.evictions(),
        }
    }

    pub fn store(&self) -> &dyn CacheStore {
        match self {
            MemoryTier::Unbounded(store) => store,
            MemoryTier::Bounded(store) => store,
        }
    }
}
