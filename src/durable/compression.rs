//! Entry Compression
//!
//! LZ4 compression for persisted entries, with a one-byte frame tag telling
//! the reader how the payload was stored.
//!
//! # Frame
//!
//! ```text
//! ┌─────┬──────────────────────────────┐
//! │ tag │ payload                      │
//! │ 0x00│ raw bytes                    │
//! │ 0x01│ size-prefixed LZ4 block      │
//! └─────┴──────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use memoria::durable::{CompressionConfig, EntryCodec};
//!
//! let codec = EntryCodec::new(CompressionConfig::default());
//! let payload = vec![b'x'; 4096];
//!
//! let framed = codec.encode(&payload);
//! assert!(framed.len() < payload.len());
//! assert_eq!(codec.decode(&framed).unwrap().as_ref(), payload.as_slice());
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const TAG_RAW: u8 = 0x00;
const TAG_LZ4: u8 = 0x01;

// =============================================================================
// Compression Algorithm
// =============================================================================

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionAlgorithm {
    /// No compression
    None,
    /// LZ4 - fast compression
    Lz4,
}

impl CompressionAlgorithm {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Lz4 => "lz4",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            CompressionAlgorithm::None => TAG_RAW,
            CompressionAlgorithm::Lz4 => TAG_LZ4,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_RAW => Some(CompressionAlgorithm::None),
            TAG_LZ4 => Some(CompressionAlgorithm::Lz4),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Compression Configuration
// =============================================================================

/// Configuration for compressing persisted entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Compress canonical entries at all
    pub enabled: bool,
    /// Minimum size to compress (smaller entries are stored raw)
    pub min_size_bytes: u64,
    /// LZ4 high-compression level
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_size_bytes: 1024, // 1KB minimum
            level: 4,
        }
    }
}

impl CompressionConfig {
    /// Store everything raw
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

// =============================================================================
// LZ4 Compressor
// =============================================================================

/// LZ4 block compressor (size-prefixed blocks)
#[derive(Debug, Clone, Copy)]
pub struct Lz4Compressor {
    level: i32,
}

impl Lz4Compressor {
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::CompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }

    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self::with_level(4)
    }
}

// =============================================================================
// Entry Codec
// =============================================================================

/// Frames payloads for canonical entries, compressing when worthwhile
#[derive(Debug, Clone)]
pub struct EntryCodec {
    config: CompressionConfig,
    lz4: Lz4Compressor,
}

impl EntryCodec {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            lz4: Lz4Compressor::with_level(config.level),
            config,
        }
    }

    /// Frame `payload`, falling back to raw when compression is off, fails, or doesn't help
    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let algorithm = self.choose(payload.len() as u64);

        let body = match algorithm {
            CompressionAlgorithm::None => None,
            CompressionAlgorithm::Lz4 => match self.lz4.compress(payload) {
                Ok(compressed) if compressed.len() < payload.len() => Some(compressed),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Compression failed, storing raw: {}", e);
                    None
                }
            },
        };

        let (algorithm, body) = match body {
            Some(compressed) => (CompressionAlgorithm::Lz4, compressed),
            None => (CompressionAlgorithm::None, payload.to_vec()),
        };

        let mut framed = Vec::with_capacity(body.len() + 1);
        framed.push(algorithm.tag());
        framed.extend_from_slice(&body);
        framed
    }

    /// Unwrap a framed payload
    pub fn decode(&self, framed: &[u8]) -> Result<Bytes> {
        let (&tag, body) = framed.split_first().ok_or_else(|| Error::DecompressionFailed {
            algorithm: "frame".into(),
            reason: "empty entry".into(),
        })?;

        match CompressionAlgorithm::from_tag(tag) {
            Some(CompressionAlgorithm::None) => Ok(Bytes::copy_from_slice(body)),
            Some(CompressionAlgorithm::Lz4) => Ok(Bytes::from(self.lz4.decompress(body)?)),
            None => Err(Error::DecompressionFailed {
                algorithm: "frame".into(),
                reason: format!("unknown frame tag 0x{:02x}", tag),
            }),
        }
    }

    /// Decode a bare LZ4 block (the `.lz4` alternate format)
    pub fn decode_lz4_block(&self, data: &[u8]) -> Result<Bytes> {
        Ok(Bytes::from(self.lz4.decompress(data)?))
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    fn choose(&self, len: u64) -> CompressionAlgorithm {
        if self.config.enabled && len >= self.config.min_size_bytes {
            CompressionAlgorithm::Lz4
        } else {
            CompressionAlgorithm::None
        }
    }
}

impl Default for EntryCodec {
    fn default() -> Self {
        Self::new(CompressionConfig::default())
    }
}
