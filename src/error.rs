//! Error types for the memoization cache

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cache operations
#[derive(Error, Debug)]
pub enum Error {
    /// Item absent at the queried tier or scope
    #[error("Item not found: {key}")]
    NotFound { key: String },

    /// No tier configured where one is required, or otherwise unusable configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfiguration(String),

    /// Capacity string without a leading number
    #[error("Invalid capacity format: \"{0}\" does not start with a number")]
    InvalidCapacityFormat(String),

    /// Capacity string with an unrecognized unit
    #[error("Unknown capacity unit: \"{0}\"")]
    UnknownUnit(String),

    /// Storage root collides with a non-directory resource
    #[error("Storage path {0} exists and is not a directory")]
    PathConflict(PathBuf),

    /// Contract method invoked on a store variant that does not provide it
    #[error("Operation '{operation}' is not supported by {store} store")]
    UnsupportedOperation {
        operation: &'static str,
        store: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Item without a canonical encoding (e.g. a NaN float)
    #[error("Item cannot be hashed: {0}")]
    UnhashableItem(String),

    /// Value or key serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file parse error
    #[error("Failed to parse configuration file: {0}")]
    ConfigFile(#[from] serde_yaml::Error),

    // =========================================================================
    // Compression Errors
    // =========================================================================
    /// Compression failed
    #[error("Compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("Decompression with {algorithm} failed: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },
}

impl Error {
    /// Build a `NotFound` error for a key or item description
    pub fn not_found(key: impl std::fmt::Display) -> Self {
        Error::NotFound {
            key: key.to_string(),
        }
    }

    /// True for the tier-local miss signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for errors raised while validating configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfiguration(_)
                | Error::InvalidCapacityFormat(_)
                | Error::UnknownUnit(_)
                | Error::ConfigFile(_)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::not_found("abc").is_not_found());
        assert!(!Error::not_found("abc").is_configuration());
        assert!(Error::UnknownUnit("zb".into()).is_configuration());
        assert!(Error::InvalidCapacityFormat("kb".into()).is_configuration());
        assert!(!Error::PathConflict(PathBuf::from("/tmp/x")).is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedOperation {
            operation: "capacity",
            store: "disk".into(),
        };
        assert_eq!(
            err.to_string(),
            "Operation 'capacity' is not supported by disk store"
        );
        assert_eq!(Error::not_found("k1").to_string(), "Item not found: k1");
    }
}
