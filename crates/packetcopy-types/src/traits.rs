//! Core traits for PacketCopy operations
//!
//! These are the seams between the copy worker, the throughput sampler and
//! whatever front end drives them.

use crate::{PacketProgress, Result};
use std::path::Path;

/// Receives one notification per copied packet.
///
/// Observers are called from the copy worker thread, so they must be cheap
/// and must not block; forwarding into a channel is the usual pattern.
pub trait ProgressObserver: Send + Sync {
    /// Called after a packet has been written to the destination
    fn on_packet(&self, progress: &PacketProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&PacketProgress) + Send + Sync,
{
    fn on_packet(&self, progress: &PacketProgress) {
        self(progress);
    }
}

/// Estimates how fast a path can be read
pub trait ThroughputProbe {
    /// Measure the read speed of `path` in kilobits per second
    fn measure(&mut self, path: &Path) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_closure_observer() {
        let seen = AtomicU64::new(0);
        let observer = |progress: &PacketProgress| {
            seen.fetch_add(progress.completed, Ordering::Relaxed);
        };

        let progress = PacketProgress {
            file_index: 0,
            file_count: 1,
            source: PathBuf::from("a.bin"),
            completed: 2,
            total: 2,
            bytes_copied: 2048,
            file_size: 2048,
        };
        observer.on_packet(&progress);
        observer.on_packet(&progress);

        assert_eq!(seen.load(Ordering::Relaxed), 4);
    }
}
