//! Progress observers
//!
//! Observers run on the worker thread. [`ChannelObserver`] forwards every
//! notification into a tokio channel so the consumer can handle it on its own
//! task.

use packetcopy_types::{PacketProgress, ProgressObserver};
use tokio::sync::mpsc;

/// Observer that discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_packet(&self, _progress: &PacketProgress) {}
}

/// Observer that forwards notifications into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<PacketProgress>,
}

impl ChannelObserver {
    /// Create an observer and the receiver its notifications arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PacketProgress>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Create an observer that sends into an existing channel
    pub fn from_sender(sender: mpsc::UnboundedSender<PacketProgress>) -> Self {
        Self { sender }
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_packet(&self, progress: &PacketProgress) {
        // A dropped receiver only means nobody is watching any more
        let _ = self.sender.send(progress.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn progress(completed: u64) -> PacketProgress {
        PacketProgress {
            file_index: 0,
            file_count: 1,
            source: PathBuf::from("a.bin"),
            completed,
            total: 2,
            bytes_copied: completed * 1024,
            file_size: 2048,
        }
    }

    #[tokio::test]
    async fn test_channel_observer_forwards_in_order() {
        let (observer, mut receiver) = ChannelObserver::new();
        observer.on_packet(&progress(1));
        observer.on_packet(&progress(2));
        drop(observer);

        assert_eq!(receiver.recv().await.unwrap().completed, 1);
        assert_eq!(receiver.recv().await.unwrap().completed, 2);
        assert!(receiver.recv().await.is_none());
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (observer, receiver) = ChannelObserver::new();
        drop(receiver);
        observer.on_packet(&progress(1));
    }

    #[test]
    fn test_null_observer() {
        NullObserver.on_packet(&progress(1));
    }
}
