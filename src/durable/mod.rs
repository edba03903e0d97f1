//! Disk Tier
//!
//! Persists one entry per hash key under a storage root, delegating the byte
//! layout to a [`StorageBackend`].
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   cache_<hashkey>          canonical entry (backend-framed)
//!   cache_<hashkey>.json     alternate: raw bytes
//!   cache_<hashkey>.lz4      alternate: bare LZ4 block
//!   cache_<child-name>/      child node root, same layout
//! ```
//!
//! Lookups (`get`, `contains`) probe the canonical location, then each
//! alternate suffix in [`ALTERNATE_SUFFIXES`] order. Writes always go to the
//! canonical location. `delete` only checks the canonical location.

mod backend;
mod compression;

pub use backend::{LocalFsBackend, StorageBackend, JSON_SUFFIX, LZ4_SUFFIX};
pub use compression::{CompressionAlgorithm, CompressionConfig, EntryCodec, Lz4Compressor};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::key::HashKey;
use crate::store::{CacheStore, StoreKind};

/// Prefix of every entry and child directory name
pub const ENTRY_PREFIX: &str = "cache_";

/// Alternate entry suffixes, in lookup priority order
pub const ALTERNATE_SUFFIXES: [&str; 2] = [JSON_SUFFIX, LZ4_SUFFIX];

/// One classified child of a storage root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskEntry {
    /// Persisted value; `key` is the literal on-disk key, suffix stripped
    Item { key: HashKey, path: PathBuf },
    /// Root of a child node
    Child { name: String, path: PathBuf },
    /// Zero-length entry or empty directory left by an interrupted write
    Incomplete { path: PathBuf },
}

/// Disk-backed store rooted at a directory
#[derive(Debug, Clone)]
pub struct DurableStore {
    root: PathBuf,
    backend: Arc<dyn StorageBackend>,
}

impl DurableStore {
    /// Open a store at `root`, creating the directory if missing
    pub fn open(root: impl Into<PathBuf>, backend: Arc<dyn StorageBackend>) -> Result<Self> {
        let root = root.into();
        if !backend.exists(&root) {
            debug!("Creating cache directory {}", root.display());
            backend.make_dir(&root)?;
        } else if backend.is_file(&root) {
            return Err(Error::PathConflict(root));
        }
        Ok(Self { root, backend })
    }

    /// Open a store over the local filesystem
    pub fn local(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open(root, Arc::new(LocalFsBackend::default()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Canonical location of `key`
    pub fn entry_path(&self, key: &HashKey) -> PathBuf {
        self.root.join(format!("{}{}", ENTRY_PREFIX, key))
    }

    /// Root directory of the child node `name`
    pub fn child_root(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", ENTRY_PREFIX, name))
    }

    /// First existing location of `key`: canonical, then alternates
    fn locate(&self, key: &HashKey) -> Option<PathBuf> {
        let canonical = self.entry_path(key);
        if self.backend.exists(&canonical) {
            return Some(canonical);
        }
        ALTERNATE_SUFFIXES
            .iter()
            .map(|suffix| self.backend.with_suffix(&canonical, suffix))
            .find(|path| self.backend.exists(path))
    }

    /// Load the entry at an exact path (no key derivation)
    pub fn load_path(&self, path: &Path) -> Result<Bytes> {
        self.backend.load(path)
    }

    /// Remove an entry or directory found by [`scan`](Self::scan)
    pub fn remove_path(&self, path: &Path) -> Result<()> {
        self.backend.delete(path)
    }

    /// Size on disk of an entry found by [`scan`](Self::scan)
    pub fn size_of(&self, path: &Path) -> Result<u64> {
        self.backend.size(path)
    }

    /// Classify the children of the storage root; foreign names are skipped
    pub fn scan(&self) -> Result<Vec<DiskEntry>> {
        let mut entries = Vec::new();

        for path in self.backend.list(&self.root)? {
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let rest = match name.strip_prefix(ENTRY_PREFIX) {
                Some(rest) if !rest.is_empty() => rest.to_string(),
                _ => continue,
            };

            if self.backend.is_empty(&path)? {
                entries.push(DiskEntry::Incomplete { path });
            } else if self.backend.is_file(&path) {
                let key = ALTERNATE_SUFFIXES
                    .iter()
                    .find_map(|suffix| rest.strip_suffix(suffix))
                    .unwrap_or(&rest);
                entries.push(DiskEntry::Item {
                    key: HashKey::from_raw(key),
                    path,
                });
            } else {
                entries.push(DiskEntry::Child { name: rest, path });
            }
        }

        Ok(entries)
    }

    /// Names of child nodes persisted under this root
    pub fn child_names(&self) -> Result<Vec<String>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter_map(|entry| match entry {
                DiskEntry::Child { name, .. } => Some(name),
                _ => None,
            })
            .collect())
    }
}

impl CacheStore for DurableStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Durable
    }

    fn contains(&self, key: &HashKey) -> Result<bool> {
        Ok(self.locate(key).is_some())
    }

    fn get(&self, key: &HashKey) -> Result<Bytes> {
        let path = self.locate(key).ok_or_else(|| Error::not_found(key))?;
        trace!("Loading {}", path.display());
        self.backend.load(&path)
    }

    fn set(&self, key: &HashKey, value: Bytes) -> Result<()> {
        // The root may have been pruned as empty since it was opened
        if !self.backend.exists(&self.root) {
            self.backend.make_dir(&self.root)?;
        }
        let path = self.entry_path(key);
        self.backend.save(&path, &value)?;
        trace!("Saved {} ({} bytes)", path.display(), value.len());
        Ok(())
    }

    /// Deletes the canonical entry only; suffixed alternates are not probed
    fn delete(&self, key: &HashKey) -> Result<()> {
        let path = self.entry_path(key);
        if !self.backend.exists(&path) {
            return Err(Error::not_found(key));
        }
        self.backend.delete(&path)
    }

    fn keys(&self) -> Result<Vec<HashKey>> {
        let keys: BTreeSet<HashKey> = self
            .scan()?
            .into_iter()
            .filter_map(|entry| match entry {
                DiskEntry::Item { key, .. } => Some(key),
                _ => None,
            })
            .collect();
        Ok(keys.into_iter().collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    fn key(name: &str) -> HashKey {
        HashKey::from_raw(name)
    }

    #[test]
    fn test_open_creates_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("cache");

        let store = DurableStore::local(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[test]
    fn test_open_rejects_file_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("occupied");
        fs::write(&root, b"not a directory").unwrap();

        assert_matches!(DurableStore::local(&root), Err(Error::PathConflict(p)) if p == root);
    }

    #[test]
    fn test_set_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::local(dir.path()).unwrap();

        store.set(&key("k1"), Bytes::from_static(b"\"v\"")).unwrap();
        assert!(dir.path().join("cache_k1").is_file());
        assert!(store.contains(&key("k1")).unwrap());
        assert_eq!(store.get(&key("k1")).unwrap().as_ref(), b"\"v\"");

        store.delete(&key("k1")).unwrap();
        assert!(!store.contains(&key("k1")).unwrap());
        assert_matches!(store.delete(&key("k1")), Err(Error::NotFound { .. }));
        assert_matches!(store.get(&key("k1")), Err(Error::NotFound { .. }));
    }

    #[test]
    fn test_alternate_suffix_lookup() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::local(dir.path()).unwrap();
        fs::write(dir.path().join("cache_ext.json"), b"{\"from\":\"tool\"}").unwrap();

        assert!(store.contains(&key("ext")).unwrap());
        assert_eq!(store.get(&key("ext")).unwrap().as_ref(), b"{\"from\":\"tool\"}");
        assert_eq!(store.keys().unwrap(), vec![key("ext")]);
    }

    #[test]
    fn test_canonical_wins_over_alternates() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::local(dir.path()).unwrap();
        fs::write(dir.path().join("cache_k.json"), b"\"alternate\"").unwrap();
        store.set(&key("k"), Bytes::from_static(b"\"canonical\"")).unwrap();

        assert_eq!(store.get(&key("k")).unwrap().as_ref(), b"\"canonical\"");
        assert_eq!(store.keys().unwrap(), vec![key("k")]);
    }

    #[test]
    fn test_delete_ignores_alternates() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::local(dir.path()).unwrap();
        fs::write(dir.path().join("cache_ext.json"), b"1").unwrap();

        assert_matches!(store.delete(&key("ext")), Err(Error::NotFound { .. }));
        assert!(store.contains(&key("ext")).unwrap());
    }

    #[test]
    fn test_scan_classifies_children() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::local(dir.path()).unwrap();

        store.set(&key("item"), Bytes::from_static(b"1")).unwrap();
        fs::create_dir(dir.path().join("cache_child")).unwrap();
        fs::write(dir.path().join("cache_child").join("cache_x"), b"\x002").unwrap();
        fs::create_dir(dir.path().join("cache_hollow")).unwrap();
        fs::write(dir.path().join("cache_torn"), b"").unwrap();
        fs::write(dir.path().join("README"), b"foreign").unwrap();

        let entries = store.scan().unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.contains(&DiskEntry::Child {
            name: "child".into(),
            path: dir.path().join("cache_child"),
        }));
        assert!(entries.contains(&DiskEntry::Item {
            key: key("item"),
            path: dir.path().join("cache_item"),
        }));
        assert!(entries.contains(&DiskEntry::Incomplete {
            path: dir.path().join("cache_hollow"),
        }));
        assert!(entries.contains(&DiskEntry::Incomplete {
            path: dir.path().join("cache_torn"),
        }));
        assert_eq!(store.child_names().unwrap(), vec!["child".to_string()]);
    }

    #[test]
    fn test_durable_has_no_capacity() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::local(dir.path()).unwrap();
        assert_matches!(store.capacity(), Err(Error::UnsupportedOperation { .. }));
    }
}
