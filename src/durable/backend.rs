//! Storage Backend
//!
//! The filesystem-like contract the disk tier depends on. The core never
//! inspects byte formats itself; the backend decides how a value is laid out
//! on the medium.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use super::compression::{CompressionConfig, EntryCodec};
use crate::error::{Error, Result};

/// Suffix of raw entries written by external tools
pub const JSON_SUFFIX: &str = ".json";

/// Suffix of bare LZ4 block entries
pub const LZ4_SUFFIX: &str = ".lz4";

/// Storage medium contract
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Whether anything exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a regular entry (not a directory)
    fn is_file(&self, path: &Path) -> bool;

    /// Zero-length entry or directory without children
    fn is_empty(&self, path: &Path) -> Result<bool>;

    /// Create `path` and missing parents
    fn make_dir(&self, path: &Path) -> Result<()>;

    /// Children of a directory, sorted by name
    fn list(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Load the value stored at `path`
    fn load(&self, path: &Path) -> Result<Bytes>;

    /// Store `value` at `path`, replacing whatever was there
    fn save(&self, path: &Path, value: &[u8]) -> Result<()>;

    /// Remove an entry or a whole directory tree
    fn delete(&self, path: &Path) -> Result<()>;

    /// Size of the stored entry in bytes
    fn size(&self, path: &Path) -> Result<u64>;

    /// `path` with `suffix` appended to its file name
    fn with_suffix(&self, path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}

// =============================================================================
// Local Filesystem Backend
// =============================================================================

/// Backend over the local filesystem
#[derive(Debug, Clone, Default)]
pub struct LocalFsBackend {
    codec: EntryCodec,
}

impl LocalFsBackend {
    pub fn new(compression: CompressionConfig) -> Self {
        Self {
            codec: EntryCodec::new(compression),
        }
    }

    pub fn codec(&self) -> &EntryCodec {
        &self.codec
    }
}

impl StorageBackend for LocalFsBackend {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_empty(&self, path: &Path) -> Result<bool> {
        let meta = fs::metadata(path)?;
        if meta.is_dir() {
            Ok(fs::read_dir(path)?.next().is_none())
        } else {
            Ok(meta.len() == 0)
        }
    }

    fn make_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn list(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut children = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        children.sort();
        Ok(children)
    }

    fn load(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::not_found(path.display()),
            _ => Error::Io(e),
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if name.ends_with(JSON_SUFFIX) {
            Ok(Bytes::from(data))
        } else if name.ends_with(LZ4_SUFFIX) {
            self.codec.decode_lz4_block(&data)
        } else {
            self.codec.decode(&data)
        }
    }

    fn save(&self, path: &Path, value: &[u8]) -> Result<()> {
        fs::write(path, self.codec.encode(value))?;
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        result.map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::not_found(path.display()),
            _ => Error::Io(e),
        })
    }

    fn size(&self, path: &Path) -> Result<u64> {
        Ok(fs::metadata(path)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::compression::Lz4Compressor;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_canonical() {
        let dir = TempDir::new().unwrap();
        let backend = LocalFsBackend::default();
        let path = dir.path().join("cache_abc");

        backend.save(&path, b"{\"a\":1}").unwrap();
        assert!(backend.exists(&path));
        assert!(backend.is_file(&path));
        assert_eq!(backend.load(&path).unwrap().as_ref(), b"{\"a\":1}");
    }

    #[test]
    fn test_load_alternate_formats() {
        let dir = TempDir::new().unwrap();
        let backend = LocalFsBackend::default();

        let json = dir.path().join("cache_j.json");
        fs::write(&json, b"[1,2,3]").unwrap();
        assert_eq!(backend.load(&json).unwrap().as_ref(), b"[1,2,3]");

        let lz4 = dir.path().join("cache_l.lz4");
        let payload = b"\"compressed payload compressed payload\"".to_vec();
        fs::write(&lz4, Lz4Compressor::default().compress(&payload).unwrap()).unwrap();
        assert_eq!(backend.load(&lz4).unwrap().as_ref(), payload.as_slice());
    }

    #[test]
    fn test_is_empty_and_delete() {
        let dir = TempDir::new().unwrap();
        let backend = LocalFsBackend::default();

        let sub = dir.path().join("cache_child");
        backend.make_dir(&sub).unwrap();
        assert!(backend.is_empty(&sub).unwrap());

        let blank = dir.path().join("cache_blank");
        fs::write(&blank, b"").unwrap();
        assert!(backend.is_empty(&blank).unwrap());

        backend.delete(&sub).unwrap();
        backend.delete(&blank).unwrap();
        assert!(!backend.exists(&sub));
        assert_matches!(backend.delete(&blank), Err(Error::NotFound { .. }));
    }

    #[test]
    fn test_list_sorted_and_suffix() {
        let dir = TempDir::new().unwrap();
        let backend = LocalFsBackend::default();

        for name in ["cache_b", "cache_a", "cache_c"] {
            backend.save(&dir.path().join(name), b"1").unwrap();
        }
        let names: Vec<String> = backend
            .list(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["cache_a", "cache_b", "cache_c"]);

        let suffixed = backend.with_suffix(&dir.path().join("cache_a"), ".json");
        assert!(suffixed.ends_with("cache_a.json"));
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let backend = LocalFsBackend::default();
        assert_matches!(
            backend.load(&dir.path().join("cache_missing")),
            Err(Error::NotFound { .. })
        );
    }
}
