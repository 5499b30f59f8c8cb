//! Batch packet copy engine for PacketCopy
//!
//! This crate ties the registry, the packet copier and the throughput sampler
//! together behind [`CopyEngine`]:
//!
//! - **Source registry**: ordered, case-insensitively unique source files
//! - **Single worker**: one named background thread per job, packets copied
//!   strictly in order
//! - **Progress**: one [`ProgressObserver`](packetcopy_types::ProgressObserver)
//!   notification per copied packet, with a channel adapter
//! - **Cancellation**: a cancellation token checked between packets and
//!   sub-chunks, with a bounded wait before the worker is abandoned
//! - **Ranking**: sources can be reordered by measured read speed
//!
//! # Examples
//!
//! ```rust,no_run
//! use packetcopy_engine::{ChannelObserver, CopyEngine};
//! use packetcopy_types::PacketSize;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = CopyEngine::new();
//! engine.add_source("movie.mkv");
//! engine.add_directory("photos", true);
//!
//! let (observer, mut progress) = ChannelObserver::new();
//! engine.start("backup", PacketSize::default(), Arc::new(observer))?;
//!
//! while let Some(p) = progress.recv().await {
//!     println!("{}: {}/{}", p.source.display(), p.completed, p.total);
//! }
//! let report = engine.wait().await?;
//! println!("Copied {} files", report.files_copied);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod job;
pub mod monitor;
pub mod registry;

pub use engine::{CopyEngine, EngineBuilder, EngineOptions};
pub use job::{CopySettings, JobId};
pub use monitor::{ChannelObserver, NullObserver};
pub use registry::SourceRegistry;
