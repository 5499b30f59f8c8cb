//! Blocking file I/O for PacketCopy
//!
//! This crate holds the two pieces that actually touch file data:
//!
//! - **Packet copying**: [`PacketCopier`] copies one byte range of a source file to
//!   the same offset of an open destination, in bounded sub-chunks through a
//!   reusable buffer, checking a cancellation token between sub-chunks
//! - **Throughput sampling**: [`ThroughputSampler`] estimates a file's read speed
//!   from a few timed reads, and [`measure_and_sort`] ranks paths by it
//! - **Access hints**: sequential or random access advice passed to the OS
//!
//! Everything here is synchronous; the engine runs it on its worker thread.
//!
//! # Examples
//!
//! ```rust,no_run
//! use packetcopy_io::{prepare_destination, PacketCopier};
//! use packetcopy_types::{BufferSize, PacketPlan, PacketSize};
//! use tokio_util::sync::CancellationToken;
//!
//! # fn example() -> packetcopy_types::Result<()> {
//! let source = std::path::Path::new("movie.mkv");
//! let size = std::fs::metadata(source)?.len();
//! let mut dest = prepare_destination("out/movie.mkv", size, true)?;
//!
//! let mut copier = PacketCopier::new(BufferSize::default(), CancellationToken::new());
//! for packet in PacketPlan::new(size, PacketSize::default()).packets() {
//!     copier.copy_packet(source, &mut dest, packet)?;
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod hint;
pub mod packet;
pub mod sampler;

pub use buffer::CopyBuffer;
pub use hint::{create_with_hint, open_with_hint, AccessPattern};
pub use packet::{prepare_destination, PacketCopier};
pub use sampler::{measure_and_sort, measure_speed, sample_offsets, SamplerOptions, ThroughputSampler};
