//! Configuration value types for PacketCopy
//!
//! Packet and buffer sizes are validated once, at construction, so the engine
//! never has to re-check them.

use crate::Error;
use std::fmt;
use std::str::FromStr;

/// Size of one packet, the unit of work and progress.
///
/// Only the power-of-two sizes from 16 KiB to 1 MiB are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "usize", into = "usize")
)]
pub struct PacketSize(usize);

impl PacketSize {
    /// Smallest packet size (16KB)
    pub const MIN: usize = 16 * 1024;
    /// Largest packet size (1MB)
    pub const MAX: usize = 1024 * 1024;
    /// Default packet size (64KB)
    pub const DEFAULT: usize = 64 * 1024;
    /// Every supported size, smallest first
    pub const ALL: [usize; 7] = [
        16 * 1024,
        32 * 1024,
        64 * 1024,
        128 * 1024,
        256 * 1024,
        512 * 1024,
        1024 * 1024,
    ];

    /// Create a new packet size with validation
    pub fn new(size: usize) -> Result<Self, Error> {
        if Self::ALL.contains(&size) {
            Ok(Self(size))
        } else {
            Err(Error::InvalidPacketSize {
                size,
                message: format!(
                    "must be a power of two between {} and {} bytes",
                    Self::MIN,
                    Self::MAX
                ),
            })
        }
    }

    /// Packet size at `index` of [`PacketSize::ALL`] (16 KiB shifted left by `index`)
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied().map(Self)
    }

    /// Every supported packet size
    pub fn all() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().map(Self)
    }

    /// Get the packet size in bytes
    pub fn get(self) -> usize {
        self.0
    }

    /// Get the packet size in bytes as `u64`, for offset arithmetic
    pub fn as_u64(self) -> u64 {
        self.0 as u64
    }
}

impl Default for PacketSize {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<usize> for PacketSize {
    type Error = Error;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

impl From<PacketSize> for usize {
    fn from(size: PacketSize) -> Self {
        size.0
    }
}

impl fmt::Display for PacketSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1024 * 1024 {
            write!(f, "{}M", self.0 / (1024 * 1024))
        } else {
            write!(f, "{}K", self.0 / 1024)
        }
    }
}

impl FromStr for PacketSize {
    type Err = Error;

    /// Accepts plain byte counts (`65536`) and `K`/`KB`/`KiB`/`M`/`MB`/`MiB` suffixes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let (digits, multiplier) = if let Some(rest) = strip_unit(&upper, &["KIB", "KB", "K"]) {
            (rest, 1024)
        } else if let Some(rest) = strip_unit(&upper, &["MIB", "MB", "M"]) {
            (rest, 1024 * 1024)
        } else {
            (upper.as_str(), 1)
        };

        let value: usize = digits.trim().parse().map_err(|_| Error::InvalidPacketSize {
            size: 0,
            message: format!("'{}' is not a size", trimmed),
        })?;
        Self::new(value.saturating_mul(multiplier))
    }
}

fn strip_unit<'a>(value: &'a str, units: &[&str]) -> Option<&'a str> {
    units.iter().find_map(|unit| value.strip_suffix(unit))
}

/// Size of the reusable copy buffer, which bounds one sub-chunk of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "usize", into = "usize")
)]
pub struct BufferSize(usize);

impl BufferSize {
    /// Minimum buffer size (4KB)
    pub const MIN: usize = 4 * 1024;
    /// Maximum buffer size (64MB)
    pub const MAX: usize = 64 * 1024 * 1024;
    /// Default buffer size (1MB)
    pub const DEFAULT: usize = 1024 * 1024;

    /// Create a new buffer size with validation
    pub fn new(size: usize) -> Result<Self, Error> {
        if size < Self::MIN {
            Err(Error::config(format!(
                "Buffer size {} is below minimum {}",
                size,
                Self::MIN
            )))
        } else if size > Self::MAX {
            Err(Error::config(format!(
                "Buffer size {} exceeds maximum {}",
                size,
                Self::MAX
            )))
        } else if !size.is_power_of_two() {
            Err(Error::config(format!(
                "Buffer size {} must be a power of two",
                size
            )))
        } else {
            Ok(Self(size))
        }
    }

    /// Get the buffer size value
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<usize> for BufferSize {
    type Error = Error;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

impl From<BufferSize> for usize {
    fn from(size: BufferSize) -> Self {
        size.0
    }
}
