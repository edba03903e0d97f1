//! Capacity Accounting
//!
//! A byte budget plus an approximate running usage counter. Usage is adjusted
//! by the estimated footprint of the objects added or removed and is never
//! recomputed from the stored entries, so it may drift from the real heap
//! usage. Bookkeeping stays O(1) per mutation.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::key::HashKey;

/// Recognized units (lowercase) and their size in bytes
pub const UNITS: [(&str, u64); 8] = [
    ("b", 1),
    ("byte", 1),
    ("bytes", 1),
    ("kb", 1 << 10),
    ("mb", 1 << 20),
    ("gb", 1 << 30),
    ("tb", 1 << 40),
    ("pb", 1 << 50),
];

/// Capacity limit as it appears in configuration: a byte count or a unit string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapacityLimit {
    /// Plain byte count
    Bytes(u64),
    /// Human-readable size such as `"512mb"` or `"1.5 GB"`
    Text(String),
}

impl From<u64> for CapacityLimit {
    fn from(bytes: u64) -> Self {
        CapacityLimit::Bytes(bytes)
    }
}

impl From<&str> for CapacityLimit {
    fn from(text: &str) -> Self {
        CapacityLimit::Text(text.to_string())
    }
}

impl From<String> for CapacityLimit {
    fn from(text: String) -> Self {
        CapacityLimit::Text(text)
    }
}

// =============================================================================
// Footprint Estimation
// =============================================================================

/// Approximate in-memory footprint of an object, in bytes
pub trait Footprint {
    fn footprint(&self) -> u64;
}

impl Footprint for Bytes {
    fn footprint(&self) -> u64 {
        (std::mem::size_of::<Bytes>() + self.len()) as u64
    }
}

impl Footprint for HashKey {
    fn footprint(&self) -> u64 {
        (std::mem::size_of::<String>() + self.as_str().len()) as u64
    }
}

impl Footprint for str {
    fn footprint(&self) -> u64 {
        self.len() as u64
    }
}

impl Footprint for String {
    fn footprint(&self) -> u64 {
        (std::mem::size_of::<String>() + self.len()) as u64
    }
}

impl Footprint for [u8] {
    fn footprint(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: Footprint + ?Sized> Footprint for &T {
    fn footprint(&self) -> u64 {
        (**self).footprint()
    }
}

impl Footprint for Vec<u8> {
    fn footprint(&self) -> u64 {
        (std::mem::size_of::<Vec<u8>>() + self.len()) as u64
    }
}

// =============================================================================
// Capacity
// =============================================================================

/// Byte budget with an approximate usage counter
#[derive(Debug, Clone, PartialEq)]
pub struct Capacity {
    /// Budget in bytes, fixed after parsing
    limit: u64,
    /// Approximate bytes in use
    used: u64,
    /// Unit the limit was expressed in (for display)
    unit: &'static str,
}

impl Capacity {
    /// Capacity of `limit` bytes
    pub fn from_bytes(limit: u64) -> Self {
        Self {
            limit,
            used: 0,
            unit: "byte",
        }
    }

    /// Parse a human-readable size: leading number, optional unit (default byte)
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let number_len = numeric_prefix_len(trimmed);
        if number_len == 0 {
            return Err(Error::InvalidCapacityFormat(value.to_string()));
        }

        let (number_str, rest) = trimmed.split_at(number_len);
        let number: f64 = number_str
            .parse()
            .map_err(|_| Error::InvalidCapacityFormat(value.to_string()))?;

        let unit_token = rest.trim().to_lowercase();
        let unit_token = if unit_token.is_empty() {
            "byte".to_string()
        } else {
            unit_token
        };

        let (unit, unit_size) = UNITS
            .iter()
            .find(|(name, _)| *name == unit_token)
            .copied()
            .ok_or(Error::UnknownUnit(unit_token))?;

        Ok(Self {
            limit: (number * unit_size as f64) as u64,
            used: 0,
            unit,
        })
    }

    /// Build from a configuration value
    pub fn from_limit(limit: &CapacityLimit) -> Result<Self> {
        match limit {
            CapacityLimit::Bytes(bytes) => Ok(Self::from_bytes(*bytes)),
            CapacityLimit::Text(text) => Self::parse(text),
        }
    }

    /// Same limit, usage counter reset to zero
    pub fn fresh(&self) -> Self {
        Self {
            limit: self.limit,
            used: 0,
            unit: self.unit,
        }
    }

    #[inline]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    #[inline]
    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// True when usage strictly exceeds the limit
    #[inline]
    pub fn is_above(&self) -> bool {
        self.used > self.limit
    }

    /// Count the footprint of `objects` as used
    pub fn add(&mut self, objects: &[&dyn Footprint]) {
        let total: u64 = objects.iter().map(|o| o.footprint()).sum();
        self.used = self.used.saturating_add(total);
    }

    /// Release the footprint of `objects`
    pub fn subtract(&mut self, objects: &[&dyn Footprint]) {
        let total: u64 = objects.iter().map(|o| o.footprint()).sum();
        self.used = self.used.saturating_sub(total);
    }

    /// Utilization (0.0 - 1.0+)
    pub fn utilization(&self) -> f64 {
        if self.limit == 0 {
            return if self.used == 0 { 0.0 } else { f64::INFINITY };
        }
        self.used as f64 / self.limit as f64
    }

    fn unit_size(&self) -> u64 {
        UNITS
            .iter()
            .find(|(name, _)| *name == self.unit)
            .map(|(_, size)| *size)
            .unwrap_or(1)
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit_size = self.unit_size() as f64;
        write!(
            f,
            "{:.1} / {:.1}{}",
            self.used as f64 / unit_size,
            self.limit as f64 / unit_size,
            self.unit
        )
    }
}

/// Length of the leading `\d+(\.\d+)?` literal
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let int_len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if int_len == 0 {
        return 0;
    }
    if bytes.get(int_len) == Some(&b'.') {
        let frac_len = bytes[int_len + 1..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if frac_len > 0 {
            return int_len + 1 + frac_len;
        }
    }
    int_len
}

// =============================================================================
// Tests
// =============================================================================
