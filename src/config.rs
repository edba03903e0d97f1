//! Cache Configuration
//!
//! Tier selection and tuning for a root [`TieredCache`](crate::tiered::TieredCache).
//!
//! # Example (YAML)
//!
//! ```yaml
//! memory: true
//! capacity: 512mb
//! path: /var/cache/memoria
//! hydrate: true
//! parallelism: 4
//! namespace: [experiments]
//! compression:
//!   enabled: true
//!   min_size_bytes: 4096
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capacity::{Capacity, CapacityLimit};
use crate::durable::CompressionConfig;
use crate::error::{Error, Result};
use crate::key::{host_parallelism, Namespace};

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the memory tier
    pub memory: bool,
    /// Memory tier budget; `None` keeps the memory tier unbounded
    pub capacity: Option<CapacityLimit>,
    /// Disk tier root; `None` disables the disk tier
    pub path: Option<PathBuf>,
    /// Warm the memory tier from disk on construction
    pub hydrate: bool,
    /// Hash fan-out hint; `None` uses the host's parallelism
    pub parallelism: Option<usize>,
    /// Log every get/set/delete at info level
    pub verbose: bool,
    /// Namespace seed of the root node
    pub namespace: Vec<String>,
    /// Compression of canonical disk entries
    pub compression: CompressionConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory: true,
            capacity: None,
            path: None,
            hydrate: true,
            parallelism: None,
            verbose: false,
            namespace: Vec::new(),
            compression: CompressionConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Memory tier only, unbounded until a capacity is set
    pub fn memory_only() -> Self {
        Self::default()
    }

    /// Disk tier only
    pub fn disk_only(path: impl Into<PathBuf>) -> Self {
        Self {
            memory: false,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Memory and disk tiers
    pub fn dual(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn with_capacity(mut self, limit: impl Into<CapacityLimit>) -> Self {
        self.capacity = Some(limit.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_namespace<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespace = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_hydrate(mut self, hydrate: bool) -> Self {
        self.hydrate = hydrate;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check tier selection and parse the capacity limit
    ///
    /// Returns the memory tier's budget, if any.
    pub fn validate(&self) -> Result<Option<Capacity>> {
        if !self.memory && self.path.is_none() {
            return Err(Error::InvalidConfiguration(
                "at least one of the memory or disk tiers must be enabled".into(),
            ));
        }
        if !self.memory && self.capacity.is_some() {
            return Err(Error::InvalidConfiguration(
                "a capacity limit requires the memory tier".into(),
            ));
        }
        if self.parallelism == Some(0) {
            return Err(Error::InvalidConfiguration(
                "parallelism must be at least 1".into(),
            ));
        }
        if self.namespace.iter().any(|name| name.is_empty()) {
            return Err(Error::InvalidConfiguration(
                "namespace names must not be empty".into(),
            ));
        }

        self.capacity.as_ref().map(Capacity::from_limit).transpose()
    }

    /// Effective hash parallelism
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism.unwrap_or_else(host_parallelism)
    }

    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.namespace.iter().cloned())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert!(config.memory);
        assert!(config.hydrate);
        assert!(config.path.is_none());
        assert_matches!(config.validate(), Ok(None));
    }

    #[test]
    fn test_no_tier_is_rejected() {
        let config = CacheConfig {
            memory: false,
            ..Default::default()
        };
        assert_matches!(config.validate(), Err(Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_capacity_is_parsed_on_validate() {
        let capacity = CacheConfig::memory_only()
            .with_capacity("10kb")
            .validate()
            .unwrap()
            .unwrap();
        assert_eq!(capacity.limit(), 10240);

        assert_matches!(
            CacheConfig::memory_only().with_capacity("lots").validate(),
            Err(Error::InvalidCapacityFormat(_))
        );
        assert_matches!(
            CacheConfig::memory_only().with_capacity("3 zb").validate(),
            Err(Error::UnknownUnit(_))
        );
        assert_matches!(
            CacheConfig::disk_only("/tmp/x").with_capacity(1024u64).validate(),
            Err(Error::InvalidConfiguration(_))
        );
    }

    #[test]
    fn test_yaml_parsing() {
        let config = CacheConfig::from_yaml_str(
            r#"
capacity: 512mb
path: /var/cache/memoria
parallelism: 4
namespace: [experiments, run1]
compression:
  enabled: false
"#,
        )
        .unwrap();

        assert!(config.memory);
        assert!(config.hydrate);
        assert_eq!(config.capacity, Some(CapacityLimit::Text("512mb".into())));
        assert_eq!(config.path, Some(PathBuf::from("/var/cache/memoria")));
        assert_eq!(config.effective_parallelism(), 4);
        assert_eq!(config.namespace().to_string(), "experiments/run1");
        assert!(!config.compression.enabled);
        assert_eq!(config.compression.min_size_bytes, 1024);
    }

    #[test]
    fn test_yaml_numeric_capacity() {
        let config = CacheConfig::from_yaml_str("capacity: 4096\nmemory: true\n").unwrap();
        assert_eq!(config.capacity, Some(CapacityLimit::Bytes(4096)));
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("memoria.yaml");
        fs::write(&file, "memory: false\npath: /data/cache\n").unwrap();

        let config = CacheConfig::from_yaml_file(&file).unwrap();
        assert_eq!(config, CacheConfig::disk_only("/data/cache"));

        fs::write(&file, "memory: [not, a, bool]\n").unwrap();
        assert_matches!(CacheConfig::from_yaml_file(&file), Err(Error::ConfigFile(_)));
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        assert_matches!(
            CacheConfig::memory_only().with_parallelism(0).validate(),
            Err(Error::InvalidConfiguration(_))
        );
    }
}
