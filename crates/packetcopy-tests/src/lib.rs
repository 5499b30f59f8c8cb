//! PacketCopy integration test support
//!
//! Shared helpers for the cross-crate tests under `tests/`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// Data generators and scratch file helpers used by every integration test.
pub mod test_utils;

pub use test_utils::*;
