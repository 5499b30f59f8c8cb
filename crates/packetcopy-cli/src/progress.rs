//! Packet progress display for the copy command

use crate::display::format_bytes;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use packetcopy_types::PacketProgress;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Progress bar that follows one file at a time, measured in packets
pub struct CopyProgress {
    progress_bar: Option<ProgressBar>,
    current_file: Option<usize>,
}

impl CopyProgress {
    /// Create a tracker; `quiet` disables all output
    pub fn new(quiet: bool) -> Self {
        let progress_bar = if quiet {
            None
        } else {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} {msg} [{wide_bar:.cyan/blue}] {pos}/{len} packets")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        };

        Self {
            progress_bar,
            current_file: None,
        }
    }

    /// Apply one packet notification
    pub fn update(&mut self, progress: &PacketProgress) {
        let Some(pb) = &self.progress_bar else {
            return;
        };

        if self.current_file != Some(progress.file_index) {
            self.current_file = Some(progress.file_index);
            pb.set_length(progress.total);
            pb.set_message(format!(
                "[{}/{}] {}",
                progress.file_index + 1,
                progress.file_count,
                file_name(progress)
            ));
        }
        pb.set_position(progress.completed);

        if progress.is_file_complete() {
            let line = format!("✓ {} ({})", file_name(progress), format_bytes(progress.file_size));
            pb.suspend(|| println!("  {}", style(line).green().dim()));
        }
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        if let Some(pb) = &self.progress_bar {
            pb.finish_and_clear();
        }
    }
}

fn file_name(progress: &PacketProgress) -> String {
    progress
        .source
        .file_name()
        .map_or_else(|| progress.source.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Drain packet notifications into a [`CopyProgress`] until the channel closes
pub fn spawn_progress_task(
    mut receiver: UnboundedReceiver<PacketProgress>,
    quiet: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tracker = CopyProgress::new(quiet);
        while let Some(progress) = receiver.recv().await {
            tracker.update(&progress);
        }
        tracker.finish_and_clear();
    })
}
