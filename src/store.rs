//! Cache Store Contract
//!
//! The polymorphic key-level interface shared by every store variant:
//!
//! | Variant | Module | Budget |
//! |---------|--------|--------|
//! | [`UnboundedStore`](crate::memory::UnboundedStore) | memory | none |
//! | [`BoundedStore`](crate::memory::BoundedStore) | memory | [`Capacity`] |
//! | [`DurableStore`](crate::durable::DurableStore) | disk | none |
//! | [`TieredCache`](crate::tiered::TieredCache) | memory + disk | memory tier's |
//!
//! All methods work on already-derived [`HashKey`]s; nothing is re-hashed at
//! this layer.

use std::fmt;

use bytes::Bytes;

use crate::capacity::Capacity;
use crate::error::{Error, Result};
use crate::key::HashKey;

/// Store variant identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// In-memory, no byte budget
    Unbounded,
    /// In-memory with capacity-driven eviction
    Bounded,
    /// Persisted under a storage root
    Durable,
    /// Memory and/or disk tiers composed
    Tiered,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Unbounded => write!(f, "memory"),
            StoreKind::Bounded => write!(f, "memory (bounded)"),
            StoreKind::Durable => write!(f, "disk"),
            StoreKind::Tiered => write!(f, "tiered"),
        }
    }
}

/// Key-level cache contract
pub trait CacheStore: Send + Sync {
    /// Which variant this is
    fn kind(&self) -> StoreKind;

    /// Whether an entry exists for `key`
    fn contains(&self, key: &HashKey) -> Result<bool>;

    /// Fetch the value stored under `key`; `NotFound` if absent
    fn get(&self, key: &HashKey) -> Result<Bytes>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &HashKey, value: Bytes) -> Result<()>;

    /// Remove the entry for `key`; `NotFound` if absent
    fn delete(&self, key: &HashKey) -> Result<()>;

    /// Keys currently held by the store
    fn keys(&self) -> Result<Vec<HashKey>> {
        Err(unsupported("keys", self.kind()))
    }

    /// Snapshot of the store's byte budget
    fn capacity(&self) -> Result<Capacity> {
        Err(unsupported("capacity", self.kind()))
    }
}

pub(crate) fn unsupported(operation: &'static str, kind: StoreKind) -> Error {
    Error::UnsupportedOperation {
        operation,
        store: kind.to_string(),
    }
}
