//! Hash Key Derivation
//!
//! Turns any serializable item, qualified by the namespace of the cache node
//! it belongs to, into an opaque fixed-format [`HashKey`].
//!
//! # Protocol
//!
//! ```text
//! item ──canonical JSON──▶ bytes ──HashPrimitive(parallelism, base)──▶ HashKey
//!   └─ non-empty namespace: serialize [namespace, item] instead
//! ```
//!
//! Object keys are sorted before hashing, so equal maps derive equal keys
//! regardless of iteration order. See [`crate::canonical`].
//!
//! The parallelism hint only changes how fast the primitive runs, never the
//! resulting key.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::error::{Error, Result};

/// Default numeric base for rendered keys
pub const DEFAULT_BASE: u32 = 32;

/// Inputs at least this large are hashed on the rayon pool when parallelism > 1
pub const PARALLEL_HASH_THRESHOLD: usize = 128 * 1024;

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// =============================================================================
// Hash Key
// =============================================================================

/// Opaque content fingerprint identifying a cached item
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashKey(String);

impl HashKey {
    /// Wrap a key that was derived earlier (e.g. read back from a file name)
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HashKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Namespace
// =============================================================================

/// Ordered path of names from the root cache to a hierarchy node
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(Vec<String>);

impl Namespace {
    /// The empty root namespace
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Parse a slash-separated path such as `"fit/predict"`
    pub fn parse(path: &str) -> Self {
        Self::new(path.split('/').filter(|part| !part.is_empty()))
    }

    /// Namespace of a child node called `name`
    pub fn child(&self, name: &str) -> Self {
        let mut names = self.0.clone();
        names.push(name.to_string());
        Self(names)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        f.write_str(&self.0.join("/"))
    }
}

// =============================================================================
// Hash Primitive
// =============================================================================

/// Deterministic `(bytes, parallelism_hint, base) -> string` mapping
pub trait HashPrimitive: Send + Sync + fmt::Debug {
    /// Hash `bytes` and render the digest in `base`
    fn digest(&self, bytes: &[u8], parallelism: usize, base: u32) -> String;
}

/// BLAKE3 primitive, fanning out over rayon for large inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Primitive;

impl HashPrimitive for Blake3Primitive {
    fn digest(&self, bytes: &[u8], parallelism: usize, base: u32) -> String {
        let mut hasher = blake3::Hasher::new();
        if parallelism > 1 && bytes.len() >= PARALLEL_HASH_THRESHOLD {
            hasher.update_rayon(bytes);
        } else {
            hasher.update(bytes);
        }
        encode_base(hasher.finalize().as_bytes(), base)
    }
}

/// Render a big-endian byte string as a number in `base` (2..=36)
pub fn encode_base(bytes: &[u8], base: u32) -> String {
    debug_assert!((2..=36).contains(&base));

    let mut number: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
    let mut digits = Vec::with_capacity(bytes.len() * 2);

    while !number.is_empty() {
        let mut remainder: u32 = 0;
        let mut quotient = Vec::with_capacity(number.len());
        for &byte in &number {
            let acc = (remainder << 8) | byte as u32;
            let q = acc / base;
            remainder = acc % base;
            if !(quotient.is_empty() && q == 0) {
                quotient.push(q as u8);
            }
        }
        digits.push(DIGITS[remainder as usize]);
        number = quotient;
    }

    if digits.is_empty() {
        digits.push(b'0');
    }
    digits.iter().rev().map(|d| char::from(*d)).collect()
}

/// Host parallelism, falling back to 1 when it cannot be detected
pub fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// =============================================================================
// Key Deriver
// =============================================================================

/// Derives namespace-qualified hash keys for cacheable items
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    primitive: Arc<dyn HashPrimitive>,
    parallelism: usize,
    base: u32,
}

impl KeyDeriver {
    /// BLAKE3 deriver rendering keys in base 32
    pub fn new(parallelism: usize) -> Self {
        Self {
            primitive: Arc::new(Blake3Primitive),
            parallelism: parallelism.max(1),
            base: DEFAULT_BASE,
        }
    }

    /// Deriver over a custom primitive and base
    pub fn with_primitive(
        primitive: Arc<dyn HashPrimitive>,
        parallelism: usize,
        base: u32,
    ) -> Result<Self> {
        if !(2..=36).contains(&base) {
            return Err(Error::InvalidConfiguration(format!(
                "hash base must be between 2 and 36, got {}",
                base
            )));
        }
        Ok(Self {
            primitive,
            parallelism: parallelism.max(1),
            base,
        })
    }

    /// Derive the key of `item` within `namespace`
    pub fn derive<I>(&self, item: &I, namespace: &Namespace) -> Result<HashKey>
    where
        I: Serialize + ?Sized,
    {
        let value = canonical::to_value(item)?;
        let bytes = if namespace.is_root() {
            serde_json::to_vec(&value)?
        } else {
            serde_json::to_vec(&(namespace, &value))?
        };
        Ok(HashKey(self.primitive.digest(
            &bytes,
            self.parallelism,
            self.base,
        )))
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn base(&self) -> u32 {
        self.base
    }
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(host_parallelism())
    }
}

// =============================================================================
// Tests
// =============================================================================
