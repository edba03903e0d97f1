//! Unbounded Memory Store
//!
//! Same mapping contract as [`BoundedStore`](super::BoundedStore) without a
//! byte budget: nothing is ever evicted.

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::key::HashKey;
use crate::store::{CacheStore, StoreKind};

/// Memory store without a capacity limit
pub struct UnboundedStore {
    entries: Mutex<LruCache<HashKey, Bytes>>,
}

impl UnboundedStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
        }
    }

    /// Insert or replace an entry at the newest position
    pub fn insert(&self, key: HashKey, value: Bytes) {
        self.entries.lock().put(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for UnboundedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for UnboundedStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Unbounded
    }

    fn contains(&self, key: &HashKey) -> Result<bool> {
        Ok(self.entries.lock().contains(key))
    }

    fn get(&self, key: &HashKey) -> Result<Bytes> {
        self.entries
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key))
    }

    fn set(&self, key: &HashKey, value: Bytes) -> Result<()> {
        self.insert(key.clone(), value);
        Ok(())
    }

    fn delete(&self, key: &HashKey) -> Result<()> {
        self.entries
            .lock()
            .pop(key)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(key))
    }

    fn keys(&self) -> Result<Vec<HashKey>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .rev()
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_unbounded_roundtrip_and_delete() {
        let store = UnboundedStore::new();
        let key = HashKey::from_raw("k");

        store.set(&key, Bytes::from_static(b"v")).unwrap();
        assert!(store.contains(&key).unwrap());
        assert_eq!(store.get(&key).unwrap().as_ref(), b"v");

        store.delete(&key).unwrap();
        assert_matches!(store.delete(&key), Err(Error::NotFound { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unbounded_never_evicts() {
        let store = UnboundedStore::new();
        for i in 0..1000 {
            store
                .set(&HashKey::from_raw(format!("k{}", i)), Bytes::from(vec![0u8; 1024]))
                .unwrap();
        }
        assert_eq!(store.len(), 1000);
    }

    #[test]
    fn test_unbounded_keys_follow_recency() {
        let store = UnboundedStore::new();
        let (a, b, c) = (HashKey::from_raw("a"), HashKey::from_raw("b"), HashKey::from_raw("c"));
        for key in [&a, &b, &c] {
            store.set(key, Bytes::from_static(b"v")).unwrap();
        }
        store.get(&a).unwrap();

        assert_eq!(store.keys().unwrap(), vec![b, c, a]);
    }

    #[test]
    fn test_unbounded_has_no_capacity() {
        let store = UnboundedStore::new();
        assert_matches!(
            store.capacity(),
            Err(Error::UnsupportedOperation { operation: "capacity", .. })
        );
    }
}
