//! Cache Hierarchy
//!
//! Named child nodes, created on first lookup and reused afterwards.
//!
//! A child of node `N` named `x`:
//! - has namespace `N.namespace + [x]`, so equal items never collide across siblings
//! - persists under `N.path/cache_x` with the same storage backend
//! - gets its own memory store with `N`'s limit and a fresh usage counter
//! - inherits the hash deriver and verbosity, and is never hydrated on creation

use std::sync::Arc;

use tracing::debug;

use crate::capacity::Capacity;
use crate::durable::DurableStore;
use crate::error::{Error, Result};
use crate::tiered::TieredCache;

impl TieredCache {
    /// The child node called `name`, created on first use
    pub fn child(&self, name: &str) -> Result<Arc<TieredCache>> {
        validate_name(name)?;

        let mut children = self.children.lock();
        if let Some(child) = children.get(name) {
            return Ok(Arc::clone(child));
        }

        let disk = self
            .disk()
            .map(|disk| DurableStore::open(disk.child_root(name), Arc::clone(disk.backend())))
            .transpose()?;

        let child = Arc::new(TieredCache::assemble(
            self.namespace().child(name),
            self.deriver().clone(),
            self.memory().is_some(),
            self.budget().map(Capacity::fresh),
            disk,
            self.is_verbose(),
        ));
        debug!("Created child cache {} [{}]", child.namespace(), child);

        children.insert(name.to_string(), Arc::clone(&child));
        Ok(child)
    }

    /// Resolve a slash-separated path of child names, e.g. `"fit/predict"`
    pub fn descend(self: &Arc<Self>, path: &str) -> Result<Arc<TieredCache>> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(Arc::clone(self), |node, name| node.child(name))
    }

    /// Names of the children created so far, sorted
    pub fn child_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.children.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::InvalidConfiguration(format!(
            "invalid child cache name \"{}\"",
            name
        )));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn test_child_is_memoized() {
        let root = TieredCache::new(CacheConfig::memory_only()).unwrap();

        let a1 = root.child("a").unwrap();
        let a2 = root.child("a").unwrap();
        let b = root.child("b").unwrap();

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(root.child_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_siblings_have_disjoint_key_spaces() {
        let root = TieredCache::new(CacheConfig::memory_only()).unwrap();
        let a = root.child("a").unwrap();
        let b = root.child("b").unwrap();

        assert_ne!(a.key("x").unwrap(), b.key("x").unwrap());
        assert_ne!(root.key("x").unwrap(), a.key("x").unwrap());

        a.set("x", &1).unwrap();
        assert!(a.contains("x").unwrap());
        assert!(!b.contains("x").unwrap());
        assert!(!root.contains("x").unwrap());
    }

    #[test]
    fn test_child_inherits_tiers_with_fresh_budget() {
        let dir = TempDir::new().unwrap();
        let root = TieredCache::new(CacheConfig::dual(dir.path()).with_capacity("4kb")).unwrap();
        root.set("filler", &vec![0u8; 256]).unwrap();

        let child = root.child("fit").unwrap();
        assert_eq!(child.path(), Some(dir.path().join("cache_fit").as_path()));
        assert_eq!(child.namespace().to_string(), "fit");

        let capacity = child.as_store().capacity().unwrap();
        assert_eq!(capacity.limit(), 4096);
        assert_eq!(capacity.used(), 0);
        assert!(root.as_store().capacity().unwrap().used() > 0);
    }

    #[test]
    fn test_disk_only_child() {
        let dir = TempDir::new().unwrap();
        let root = TieredCache::new(CacheConfig::disk_only(dir.path())).unwrap();
        let child = root.child("score").unwrap();

        assert!(child.memory().is_none());
        child.set("k", "v").unwrap();
        assert_eq!(child.get::<String, _>("k").unwrap(), "v");
        assert!(dir.path().join("cache_score").is_dir());
    }

    #[test]
    fn test_descend() {
        let root = Arc::new(TieredCache::new(CacheConfig::memory_only()).unwrap());
        let leaf = root.descend("fit/predict").unwrap();

        assert_eq!(leaf.namespace().to_string(), "fit/predict");
        assert!(Arc::ptr_eq(&leaf, &root.child("fit").unwrap().child("predict").unwrap()));
        assert!(Arc::ptr_eq(&root.descend("").unwrap(), &root));
    }

    #[test]
    fn test_invalid_names() {
        let root = TieredCache::new(CacheConfig::memory_only()).unwrap();
        for name in ["", ".", "..", "a/b", "a\\b"] {
            assert_matches!(root.child(name), Err(Error::InvalidConfiguration(_)));
        }
    }
}
