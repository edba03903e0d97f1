//! Memoria - Two-Tier Memoization Cache
//!
//! A content-hash-keyed cache with a bounded in-memory tier and a durable
//! on-disk tier, organized as a hierarchy of namespaced child caches. Used to
//! memoize expensive, deterministic computations across process restarts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        TieredCache                           │
//! │   item ──KeyDeriver(namespace)──▶ HashKey                    │
//! │                                                              │
//! │  ┌────────────────────┐   miss   ┌────────────────────────┐  │
//! │  │    MemoryTier      │─────────▶│      DurableStore      │  │
//! │  │ Bounded/Unbounded  │◀─────────│ cache_<key> per entry  │  │
//! │  └────────────────────┘ backfill └────────────────────────┘  │
//! │                                                              │
//! │  children: name ──▶ TieredCache (namespace + name)           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`key`] - Hash key derivation and namespaces
//! - [`canonical`] - Order-independent item encoding
//! - [`capacity`] - Byte budgets and size parsing
//! - [`memory`] - Bounded and unbounded memory stores
//! - [`durable`] - Disk tier, storage backend and entry compression
//! - [`store`] - The key-level store contract
//! - [`tiered`] - Read-through/write-through composition and hydration
//! - [`hierarchy`] - Named child caches
//! - [`memoize`] - Call memoization
//! - [`config`] - Configuration
//! - [`stats`] - Hit/miss counters
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```
//! use memoria::{CacheConfig, TieredCache};
//!
//! let cache = TieredCache::new(CacheConfig::memory_only().with_capacity("1mb")).unwrap();
//! cache.set(&("fit", 42), &vec![0.1, 0.2]).unwrap();
//!
//! let coefficients: Vec<f64> = cache.get(&("fit", 42)).unwrap();
//! assert_eq!(coefficients, vec![0.1, 0.2]);
//! ```

pub mod canonical;
pub mod capacity;
pub mod config;
pub mod durable;
pub mod error;
pub mod hierarchy;
pub mod key;
pub mod memoize;
pub mod memory;
pub mod stats;
pub mod store;
pub mod tiered;

// Re-export commonly used types
pub use capacity::{Capacity, CapacityLimit};
pub use config::CacheConfig;
pub use durable::{CompressionConfig, DurableStore, LocalFsBackend, StorageBackend};
pub use error::{Error, Result};
pub use key::{HashKey, KeyDeriver, Namespace};
pub use memoize::{Kwargs, Memoized};
pub use memory::{BoundedStore, UnboundedStore};
pub use stats::MetricsSnapshot;
pub use store::{CacheStore, StoreKind};
pub use tiered::{HydrationReport, TieredCache};
