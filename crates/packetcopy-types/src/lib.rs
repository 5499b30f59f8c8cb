//! Core type system and error handling for PacketCopy
//!
//! This crate provides the foundational types, error handling, and shared data structures
//! used throughout the PacketCopy workspace. It includes:
//!
//! - **Error handling**: The job error taxonomy with kinds and severity levels
//! - **Core types**: Source descriptors, packet plans, job states and reports
//! - **Traits**: Progress observation and throughput probing seams
//! - **Configuration**: Validated packet and buffer sizes
//!
//! # Features
//!
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use packetcopy_types::{PacketPlan, PacketSize};
//!
//! let plan = PacketPlan::new(150 * 1024, PacketSize::default());
//! assert_eq!(plan.packet_count(), 3);
//! assert_eq!(plan.packet_len(2), 22 * 1024);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{BufferSize, PacketSize};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use traits::*;
pub use types::*;
