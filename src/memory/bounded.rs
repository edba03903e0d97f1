//! Bounded Memory Store
//!
//! In-memory tier with a byte budget. After every mutation the store evicts
//! the least recently inserted-or-read entries until `used <= limit`.
//!
//! # Design
//!
//! - An unbounded [`LruCache`] orders entries; `get` refreshes recency
//! - [`Capacity`] counts key and value footprints, never recomputed
//! - A single entry larger than the whole budget empties the store

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::capacity::Capacity;
use crate::error::{Error, Result};
use crate::key::HashKey;
use crate::store::{CacheStore, StoreKind};

struct Inner {
    entries: LruCache<HashKey, Bytes>,
    capacity: Capacity,
}

impl Inner {
    fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.capacity.is_above() {
            match self.entries.pop_lru() {
                Some((key, value)) => {
                    self.capacity.subtract(&[&key, &value]);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }
}

/// Memory store enforcing a byte budget by oldest-first eviction
pub struct BoundedStore {
    inner: Mutex<Inner>,
    /// Eviction count
    evictions: AtomicU64,
}

impl BoundedStore {
    /// Create an empty store with the given budget
    pub fn new(capacity: Capacity) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                capacity,
            }),
            evictions: AtomicU64::new(0),
        }
    }

    /// Insert or replace an entry, then evict; returns the number of entries evicted
    pub fn insert(&self, key: HashKey, value: Bytes) -> usize {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        match inner.entries.pop(&key) {
            Some(old) => {
                // The key's footprint is already counted
                inner.capacity.subtract(&[&old]);
                inner.capacity.add(&[&value]);
            }
            None => inner.capacity.add(&[&key, &value]),
        }
        inner.entries.put(key, value);

        let evicted = inner.evict();
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(
                "Evicted {} entries, {} remaining ({})",
                evicted,
                inner.entries.len(),
                inner.capacity
            );
        }
        evicted
    }

    /// Evict oldest entries until within budget
    pub fn evict(&self) -> usize {
        let evicted = self.inner.lock().evict();
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// True when usage exceeds the budget
    pub fn is_saturated(&self) -> bool {
        self.inner.lock().capacity.is_above()
    }

    /// Approximate bytes in use
    pub fn used(&self) -> u64 {
        self.inner.lock().capacity.used()
    }

    pub fn limit(&self) -> u64 {
        self.inner.lock().capacity.limit()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Get eviction count
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Drop every entry and reset usage
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.capacity = inner.capacity.fresh();
    }
}

impl CacheStore for BoundedStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Bounded
    }

    fn contains(&self, key: &HashKey) -> Result<bool> {
        Ok(self.inner.lock().entries.contains(key))
    }

    fn get(&self, key: &HashKey) -> Result<Bytes> {
        self.inner
            .lock()
            .entries
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key))
    }

    fn set(&self, key: &HashKey, value: Bytes) -> Result<()> {
        self.insert(key.clone(), value);
        Ok(())
    }

    fn delete(&self, key: &HashKey) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let value = inner
            .entries
            .pop(key)
            .ok_or_else(|| Error::not_found(key))?;
        inner.capacity.subtract(&[key, &value]);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<HashKey>> {
        Ok(self
            .inner
            .lock()
            .entries
            .iter()
            .rev()
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn capacity(&self) -> Result<Capacity> {
        Ok(self.inner.lock().capacity.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn key(name: &str) -> HashKey {
        HashKey::from_raw(name)
    }

    fn value(size: usize) -> Bytes {
        Bytes::from(vec![0u8; size])
    }

    fn entry_size(k: &HashKey, v: &Bytes) -> u64 {
        use crate::capacity::Footprint;
        k.footprint() + v.footprint()
    }

    #[test]
    fn test_set_get_contains() {
        let store = BoundedStore::new(Capacity::parse("1mb").unwrap());
        store.set(&key("a"), Bytes::from_static(b"alpha")).unwrap();

        assert!(store.contains(&key("a")).unwrap());
        assert_eq!(store.get(&key("a")).unwrap().as_ref(), b"alpha");
        assert_eq!(store.used(), entry_size(&key("a"), &Bytes::from_static(b"alpha")));
    }

    #[test]
    fn test_missing_key() {
        let store = BoundedStore::new(Capacity::from_bytes(1024));
        assert!(!store.contains(&key("nope")).unwrap());
        assert_matches!(store.get(&key("nope")), Err(Error::NotFound { .. }));
        assert_matches!(store.delete(&key("nope")), Err(Error::NotFound { .. }));
    }

    #[test]
    fn test_replace_counts_key_once() {
        let store = BoundedStore::new(Capacity::from_bytes(1 << 20));
        store.set(&key("a"), value(100)).unwrap();
        store.set(&key("a"), value(300)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.used(), entry_size(&key("a"), &value(300)));
    }

    #[test]
    fn test_delete_releases_footprint() {
        let store = BoundedStore::new(Capacity::from_bytes(1 << 20));
        store.set(&key("a"), value(100)).unwrap();
        store.set(&key("b"), value(50)).unwrap();

        store.delete(&key("a")).unwrap();
        assert_eq!(store.used(), entry_size(&key("b"), &value(50)));
        assert_matches!(store.delete(&key("a")), Err(Error::NotFound { .. }));
    }

    #[test]
    fn test_eviction_is_oldest_first() {
        let one = entry_size(&key("k0"), &value(100));
        let store = BoundedStore::new(Capacity::from_bytes(one * 3));

        for i in 0..3 {
            store.set(&key(&format!("k{}", i)), value(100)).unwrap();
        }
        assert_eq!(store.evictions(), 0);

        store.set(&key("k3"), value(100)).unwrap();
        assert_eq!(store.keys().unwrap(), vec![key("k1"), key("k2"), key("k3")]);
        assert_eq!(store.evictions(), 1);
    }

    #[test]
    fn test_read_refreshes_recency() {
        let one = entry_size(&key("k0"), &value(100));
        let store = BoundedStore::new(Capacity::from_bytes(one * 3));

        for i in 0..3 {
            store.set(&key(&format!("k{}", i)), value(100)).unwrap();
        }
        store.get(&key("k0")).unwrap();
        store.set(&key("k3"), value(100)).unwrap();

        assert!(store.contains(&key("k0")).unwrap());
        assert!(!store.contains(&key("k1")).unwrap());
        assert_eq!(store.keys().unwrap(), vec![key("k2"), key("k0"), key("k3")]);
    }

    #[test]
    fn test_oversized_entry_empties_store() {
        let mut capacity = Capacity::parse("10kb").unwrap();
        assert!(!capacity.is_above());
        let store = BoundedStore::new(capacity.clone());

        store.set(&key("small"), value(10)).unwrap();
        let evicted = store.insert(key("huge"), value(11000));

        assert_eq!(evicted, 2);
        assert!(store.is_empty());
        assert!(!store.is_saturated());
        assert_eq!(store.used(), 0);

        capacity.add(&[&value(11000)]);
        assert!(capacity.is_above());
    }

    #[test]
    fn test_capacity_snapshot_and_clear() {
        let store = BoundedStore::new(Capacity::parse("2kb").unwrap());
        store.set(&key("a"), value(64)).unwrap();

        let snapshot = store.capacity().unwrap();
        assert_eq!(snapshot.limit(), 2048);
        assert!(snapshot.used() > 0);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.used(), 0);
        assert_eq!(store.limit(), 2048);
    }

    proptest! {
        #[test]
        fn prop_used_never_exceeds_limit(
            limit in 64u64..4096,
            ops in prop::collection::vec((0u8..16, 0usize..512), 1..64),
        ) {
            let store = BoundedStore::new(Capacity::from_bytes(limit));
            for (k, size) in ops {
                store.set(&key(&format!("k{}", k)), value(size)).unwrap();
                prop_assert!(store.used() <= limit);
            }
        }

        #[test]
        fn prop_evicts_exactly_the_oldest(count in 2usize..20, keep in 1usize..10) {
            let keep = keep.min(count);
            let one = entry_size(&key("k00"), &value(32));
            let store = BoundedStore::new(Capacity::from_bytes(one * keep as u64));

            for i in 0..count {
                store.set(&key(&format!("k{:02}", i)), value(32)).unwrap();
            }

            let expected: Vec<HashKey> = (count - keep..count)
                .map(|i| key(&format!("k{:02}", i)))
                .collect();
            prop_assert_eq!(store.keys().unwrap(), expected);
        }
    }
}
