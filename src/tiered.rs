//! Tiered Cache
//!
//! Composes an optional memory tier and an optional disk tier behind one
//! item-level API.
//!
//! # Read/Write Paths
//!
//! ```text
//! get:    memory ──miss──▶ disk ──hit──▶ backfill memory ──▶ value
//! set:    memory + disk (no rollback if a later tier fails)
//! delete: memory, then disk (tolerating a disk miss if memory had it)
//! ```
//!
//! Item-level methods (`get`, `set`, ...) derive the [`HashKey`] of an item
//! within this node's [`Namespace`]. Already-derived keys go through the
//! [`CacheStore`] implementation instead and are never re-hashed.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::capacity::Capacity;
use crate::config::CacheConfig;
use crate::durable::{DiskEntry, DurableStore, LocalFsBackend, StorageBackend};
use crate::error::{Error, Result};
use crate::key::{HashKey, KeyDeriver, Namespace};
use crate::memory::MemoryTier;
use crate::stats::{CacheMetrics, LatencyTracker, MetricsSnapshot};
use crate::store::{unsupported, CacheStore, StoreKind};

/// Per-operation event: info when the node is verbose, trace otherwise
macro_rules! op_event {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    };
}

/// Outcome of a disk -> memory warm load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrationReport {
    /// Entries loaded into memory tiers
    pub loaded: usize,
    /// Incomplete entries removed from disk
    pub pruned: usize,
    /// Walk stopped early because a memory budget was reached
    pub saturated: bool,
}

/// Two-tier cache node
pub struct TieredCache {
    namespace: Namespace,
    deriver: KeyDeriver,
    memory: Option<MemoryTier>,
    disk: Option<DurableStore>,
    /// Memory budget handed to children with a fresh usage counter
    budget: Option<Capacity>,
    verbose: bool,
    pub(crate) children: Mutex<HashMap<String, Arc<TieredCache>>>,
    metrics: Arc<CacheMetrics>,
}

impl TieredCache {
    /// Create a root cache over the local filesystem
    pub fn new(config: CacheConfig) -> Result<Self> {
        let backend = Arc::new(LocalFsBackend::new(config.compression.clone()));
        Self::with_backend(config, backend)
    }

    /// Create a root cache over a custom storage backend
    pub fn with_backend(config: CacheConfig, backend: Arc<dyn StorageBackend>) -> Result<Self> {
        let deriver = KeyDeriver::new(config.effective_parallelism());
        Self::with_parts(config, backend, deriver)
    }

    /// Create a root cache with a custom backend and key deriver
    pub fn with_parts(
        config: CacheConfig,
        backend: Arc<dyn StorageBackend>,
        deriver: KeyDeriver,
    ) -> Result<Self> {
        let budget = config.validate()?;
        let disk = config
            .path
            .as_ref()
            .map(|path| DurableStore::open(path.clone(), backend))
            .transpose()?;

        let cache = Self::assemble(
            config.namespace(),
            deriver,
            config.memory,
            budget,
            disk,
            config.verbose,
        );
        debug!("Created cache [{}] at {}", cache, cache.namespace);

        if config.hydrate {
            let report = cache.hydrate()?;
            if report.loaded > 0 || report.pruned > 0 {
                debug!(
                    "Hydrated {} entries, pruned {}{}",
                    report.loaded,
                    report.pruned,
                    if report.saturated { " (memory saturated)" } else { "" }
                );
            }
        }

        Ok(cache)
    }

    pub(crate) fn assemble(
        namespace: Namespace,
        deriver: KeyDeriver,
        memory: bool,
        budget: Option<Capacity>,
        disk: Option<DurableStore>,
        verbose: bool,
    ) -> Self {
        Self {
            namespace,
            deriver,
            memory: memory.then(|| MemoryTier::new(budget.as_ref().map(Capacity::fresh))),
            disk,
            budget,
            verbose,
            children: Mutex::new(HashMap::new()),
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    // =========================================================================
    // Item-level API
    // =========================================================================

    /// Hash key of `item` within this node
    pub fn key<I>(&self, item: &I) -> Result<HashKey>
    where
        I: Serialize + ?Sized,
    {
        self.deriver.derive(item, &self.namespace)
    }

    pub fn contains<I>(&self, item: &I) -> Result<bool>
    where
        I: Serialize + ?Sized,
    {
        let key = self.key(item)?;
        self.contains_key(&key)
    }

    /// Fetch and decode the value stored for `item`
    pub fn get<V, I>(&self, item: &I) -> Result<V>
    where
        V: DeserializeOwned,
        I: Serialize + ?Sized,
    {
        let key = self.key(item)?;
        let bytes = self.get_bytes(&key)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Encode `value` and store it for `item` in every tier
    pub fn set<I, V>(&self, item: &I, value: &V) -> Result<()>
    where
        I: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let key = self.key(item)?;
        let bytes = Bytes::from(serde_json::to_vec(value)?);
        self.set_bytes(&key, bytes)
    }

    pub fn delete<I>(&self, item: &I) -> Result<()>
    where
        I: Serialize + ?Sized,
    {
        let key = self.key(item)?;
        self.delete_key(&key)
    }

    // =========================================================================
    // Key-level paths
    // =========================================================================

    fn contains_key(&self, key: &HashKey) -> Result<bool> {
        if let Some(memory) = &self.memory {
            if memory.store().contains(key)? {
                return Ok(true);
            }
        }
        match (&self.disk, &self.memory) {
            (Some(disk), _) => disk.contains(key),
            (None, Some(_)) => Ok(false),
            (None, None) => Err(Error::InvalidConfiguration(
                "no tier configured to answer contains".into(),
            )),
        }
    }

    fn get_bytes(&self, key: &HashKey) -> Result<Bytes> {
        if let Some(memory) = &self.memory {
            match memory.store().get(key) {
                Ok(value) => {
                    self.metrics.record_memory_hit();
                    op_event!(self.verbose, "get {} [{}]: memory hit", key, self.namespace);
                    return Ok(value);
                }
                Err(e) if e.is_not_found() => self.metrics.record_memory_miss(),
                Err(e) => return Err(e),
            }
        }

        let disk = match &self.disk {
            Some(disk) => disk,
            None => {
                self.metrics.record_miss();
                return Err(Error::not_found(key));
            }
        };

        let tracker = LatencyTracker::start();
        let value = match disk.get(key) {
            Ok(value) => value,
            Err(e) => {
                if e.is_not_found() {
                    self.metrics.record_disk_miss();
                    self.metrics.record_miss();
                }
                return Err(e);
            }
        };
        self.metrics.record_disk_read_latency(tracker.elapsed());
        self.metrics.record_disk_hit();
        op_event!(self.verbose, "get {} [{}]: disk hit", key, self.namespace);

        if let Some(memory) = &self.memory {
            let evicted = memory.insert(key.clone(), value.clone());
            self.metrics.record_backfill();
            self.metrics.record_evictions(evicted);
            debug!("Backfilled {} into memory, evicted {}", key, evicted);
        }

        Ok(value)
    }

    fn set_bytes(&self, key: &HashKey, value: Bytes) -> Result<()> {
        op_event!(
            self.verbose,
            "set {} [{}]: {} bytes",
            key,
            self.namespace,
            value.len()
        );

        if let Some(memory) = &self.memory {
            let evicted = memory.insert(key.clone(), value.clone());
            self.metrics.record_evictions(evicted);
        }
        if let Some(disk) = &self.disk {
            disk.set(key, value)?;
            self.metrics.record_disk_write();
        }
        Ok(())
    }

    fn delete_key(&self, key: &HashKey) -> Result<()> {
        op_event!(self.verbose, "delete {} [{}]", key, self.namespace);

        let in_memory = match &self.memory {
            Some(memory) => match memory.store().delete(key) {
                Ok(()) => true,
                Err(e) if e.is_not_found() => false,
                Err(e) => return Err(e),
            },
            None => false,
        };

        match &self.disk {
            Some(disk) => match disk.delete(key) {
                Ok(()) => Ok(()),
                Err(e) if e.is_not_found() && in_memory => {
                    warn!("Deleted {} from memory but it was never persisted", key);
                    Ok(())
                }
                Err(e) => Err(e),
            },
            None if in_memory => Ok(()),
            None => Err(Error::not_found(key)),
        }
    }

    // =========================================================================
    // Hydration
    // =========================================================================

    /// Warm the memory tier from disk until the memory budget is reached
    ///
    /// Only runs for nodes with a bounded memory tier and a disk tier. Entries
    /// are loaded under their literal on-disk key. Empty entries are removed
    /// as incomplete writes and subdirectories are walked as child nodes.
    pub fn hydrate(&self) -> Result<HydrationReport> {
        let mut report = HydrationReport::default();
        self.hydrate_into(&mut report)?;
        Ok(report)
    }

    fn hydrate_into(&self, report: &mut HydrationReport) -> Result<()> {
        let (memory, disk) = match (&self.memory, &self.disk) {
            (Some(memory), Some(disk)) if memory.is_bounded() => (memory, disk),
            _ => return Ok(()),
        };

        for entry in disk.scan()? {
            if memory.is_saturated() {
                report.saturated = true;
                return Ok(());
            }

            match entry {
                DiskEntry::Incomplete { path } => {
                    warn!("Pruning incomplete cache entry {}", path.display());
                    disk.remove_path(&path)?;
                    self.metrics.record_pruned();
                    report.pruned += 1;
                }
                DiskEntry::Item { key, path } => {
                    let value = disk.load_path(&path)?;
                    let evicted = memory.insert(key, value);
                    self.metrics.record_hydrated();
                    report.loaded += 1;
                    if evicted > 0 {
                        self.metrics.record_evictions(evicted);
                        report.saturated = true;
                        debug!("Memory budget reached while hydrating [{}]", self.namespace);
                        return Ok(());
                    }
                }
                DiskEntry::Child { name, .. } => {
                    let child = self.child(&name)?;
                    child.hydrate_into(report)?;
                    if report.saturated {
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Disk tier root, if the node has one
    pub fn path(&self) -> Option<&Path> {
        self.disk.as_ref().map(DurableStore::root)
    }

    pub fn memory(&self) -> Option<&MemoryTier> {
        self.memory.as_ref()
    }

    pub fn disk(&self) -> Option<&DurableStore> {
        self.disk.as_ref()
    }

    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    pub(crate) fn budget(&self) -> Option<&Capacity> {
        self.budget.as_ref()
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Key-level view of this node
    pub fn as_store(&self) -> &dyn CacheStore {
        self
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn stats(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Human-readable tier summary, e.g. `Memory: 1.2 / 10.0kb - Disk: /tmp/c`
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(2);
        if let Some(memory) = &self.memory {
            match memory.store().capacity() {
                Ok(capacity) => parts.push(format!("Memory: {}", capacity)),
                Err(_) => parts.push(format!("Memory: {} entries", memory.len())),
            }
        }
        if let Some(disk) = &self.disk {
            parts.push(format!("Disk: {}", disk.root().display()));
        }
        f.write_str(&parts.join(" - "))
    }
}

impl fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("namespace", &self.namespace)
            .field("tiers", &self.to_string())
            .field("children", &self.children.lock().len())
            .finish()
    }
}

impl CacheStore for TieredCache {
    fn kind(&self) -> StoreKind {
        StoreKind::Tiered
    }

    fn contains(&self, key: &HashKey) -> Result<bool> {
        self.contains_key(key)
    }

    fn get(&self, key: &HashKey) -> Result<Bytes> {
        self.get_bytes(key)
    }

    fn set(&self, key: &HashKey, value: Bytes) -> Result<()> {
        self.set_bytes(key, value)
    }

    fn delete(&self, key: &HashKey) -> Result<()> {
        self.delete_key(key)
    }

    /// Union of the keys held by both tiers, sorted
    fn keys(&self) -> Result<Vec<HashKey>> {
        let mut keys = BTreeSet::new();
        if let Some(memory) = &self.memory {
            keys.extend(memory.store().keys()?);
        }
        if let Some(disk) = &self.disk {
            keys.extend(disk.keys()?);
        }
        Ok(keys.into_iter().collect())
    }

    fn capacity(&self) -> Result<Capacity> {
        match &self.memory {
            Some(memory) => memory.store().capacity(),
            None => Err(unsupported("capacity", self.kind())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
