//! Core data types for PacketCopy
//!
//! This module provides the data types shared between the registry, the
//! throughput sampler and the copy engine.

use crate::{Error, PacketSize};
use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File size in bytes
pub type FileSize = u64;

/// Read throughput in kilobits per second
pub type Kbps = u64;

/// Compare two paths the way the registry does: case-insensitively
pub fn paths_equal_ignore_case(a: &Path, b: &Path) -> bool {
    path_key(a) == path_key(b)
}

/// Identity key of a path in the registry.
///
/// Paths that are valid Unicode are lower-cased. Other paths are kept byte for
/// byte, so distinct non-Unicode names never collapse into one key.
pub fn path_key(path: &Path) -> OsString {
    let raw = path.as_os_str();
    raw.to_str()
        .map_or_else(|| raw.to_os_string(), |s| OsString::from(s.to_lowercase()))
}

/// Copy status of one registered source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SourceStatus {
    /// Waiting to be copied
    #[default]
    Ready,
    /// Currently being copied
    Copying,
    /// Copied completely
    Done,
    /// Skipped or failed
    Failed,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ready => "Ready",
            Self::Copying => "Copying",
            Self::Done => "Done",
            Self::Failed => "Failed",
        };
        f.write_str(text)
    }
}

/// A file registered for copying
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceDescriptor {
    /// Path of the source file
    pub path: PathBuf,
    /// Current copy status
    pub status: SourceStatus,
    /// Last measured read speed, 0 when unknown
    pub measured_speed_kbps: Kbps,
}

impl SourceDescriptor {
    /// Create a ready descriptor with an unknown speed
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status: SourceStatus::Ready,
            measured_speed_kbps: 0,
        }
    }

    /// Set the measured speed
    pub fn with_speed(mut self, kbps: Kbps) -> Self {
        self.measured_speed_kbps = kbps;
        self
    }

    /// Set the status
    pub fn with_status(mut self, status: SourceStatus) -> Self {
        self.status = status;
        self
    }

    /// Check whether this descriptor refers to `path` (case-insensitive)
    pub fn matches(&self, path: &Path) -> bool {
        paths_equal_ignore_case(&self.path, path)
    }

    /// Measured speed in megabits per second, if known
    pub fn speed_mbps(&self) -> Option<f64> {
        (self.measured_speed_kbps > 0).then(|| self.measured_speed_kbps as f64 / 1000.0)
    }
}

/// Result of measuring one path
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedMeasurement {
    /// Measured path
    pub path: PathBuf,
    /// Speed estimate, `None` when the measurement failed
    pub kbps: Option<Kbps>,
}

impl SpeedMeasurement {
    /// Key used for ranking; failed measurements sort below every real speed
    pub fn rank_key(&self) -> Option<Kbps> {
        self.kbps
    }
}

/// One packet of a [`PacketPlan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Zero-based index within the file
    pub index: u64,
    /// Byte offset of the packet
    pub offset: u64,
    /// Packet length in bytes
    pub len: usize,
}

/// How a file of a given size splits into packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketPlan {
    file_size: FileSize,
    packet_size: u64,
}

impl PacketPlan {
    /// Plan the packets for a file
    pub fn new(file_size: FileSize, packet_size: PacketSize) -> Self {
        Self {
            file_size,
            packet_size: packet_size.as_u64(),
        }
    }

    /// Total file size
    pub fn file_size(&self) -> FileSize {
        self.file_size
    }

    /// Number of packets, `ceil(file_size / packet_size)`
    pub fn packet_count(&self) -> u64 {
        self.file_size.div_ceil(self.packet_size)
    }

    /// Byte offset of packet `index`
    pub fn offset(&self, index: u64) -> u64 {
        index * self.packet_size
    }

    /// Length of packet `index`; only the last one can be short
    pub fn packet_len(&self, index: u64) -> usize {
        let remaining = self.file_size.saturating_sub(self.offset(index));
        remaining.min(self.packet_size) as usize
    }

    /// Iterate over all packets in order
    pub fn packets(&self) -> impl Iterator<Item = Packet> + '_ {
        (0..self.packet_count()).map(move |index| Packet {
            index,
            offset: self.offset(index),
            len: self.packet_len(index),
        })
    }
}

/// What the worker does when a packet copy fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FailurePolicy {
    /// Abort the whole batch
    #[default]
    StopBatch,
    /// Record the error and continue with the next source
    SkipFile,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopBatch => f.write_str("stop_batch"),
            Self::SkipFile => f.write_str("skip_file"),
        }
    }
}

/// State of the copy engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JobState {
    /// No job has run yet
    #[default]
    Idle,
    /// A job is running
    Running,
    /// The last job copied every source it did not skip
    Completed,
    /// The last job was cancelled
    Cancelled,
    /// The last job failed
    Failed,
}

impl JobState {
    /// Check if a job is running
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Check if this is one of the terminal states
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Outcome and statistics of one copy job
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JobReport {
    /// State the job ended in
    pub state: JobState,
    /// Sources copied completely
    pub files_copied: u64,
    /// Sources skipped before any data was written
    pub files_skipped: u64,
    /// Sources that failed mid-copy
    pub files_failed: u64,
    /// Packets copied across all sources
    pub packets_copied: u64,
    /// Bytes copied across all sources
    pub bytes_copied: u64,
    /// When the job was started
    pub started_at: DateTime<Utc>,
    /// How long the job ran
    pub duration: Duration,
    /// Error that ended the job, if any
    pub error: Option<Error>,
    /// Per-source errors the job recovered from
    pub warnings: Vec<Error>,
    /// The worker ignored cancellation and was detached
    pub abandoned: bool,
}

impl JobReport {
    /// Create an empty report in `state`
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            files_copied: 0,
            files_skipped: 0,
            files_failed: 0,
            packets_copied: 0,
            bytes_copied: 0,
            started_at: Utc::now(),
            duration: Duration::ZERO,
            error: None,
            warnings: Vec::new(),
            abandoned: false,
        }
    }

    /// Check if the job completed
    pub fn is_success(&self) -> bool {
        self.state == JobState::Completed
    }

    /// Calculate the overall transfer rate in bytes per second
    pub fn transfer_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.bytes_copied as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Progress notification sent once per copied packet
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PacketProgress {
    /// Position of the source within the job
    pub file_index: usize,
    /// Number of sources in the job
    pub file_count: usize,
    /// Source being copied
    pub source: PathBuf,
    /// Packets of this file copied so far
    pub completed: u64,
    /// Packets in this file
    pub total: u64,
    /// Bytes of this file copied so far
    pub bytes_copied: u64,
    /// Size of this file
    pub file_size: FileSize,
}

impl PacketProgress {
    /// Progress through the current file, 0 to 100
    pub fn percent(&self) -> u64 {
        if self.total > 0 {
            self.completed * 100 / self.total
        } else {
            0
        }
    }

    /// Check if this notification is for the last packet of the file
    pub fn is_file_complete(&self) -> bool {
        self.completed >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn packet_size_strategy() -> impl Strategy<Value = PacketSize> {
        (0usize..PacketSize::ALL.len()).prop_map(|i| PacketSize::from_index(i).unwrap())
    }

    proptest! {
        #[test]
        fn test_plan_covers_file_exactly(
            file_size in 0u64..64 * 1024 * 1024,
            packet_size in packet_size_strategy()
        ) {
            let plan = PacketPlan::new(file_size, packet_size);
            let packets: Vec<Packet> = plan.packets().collect();

            prop_assert_eq!(packets.len() as u64, plan.packet_count());
            prop_assert_eq!(
                plan.packet_count(),
                (file_size + packet_size.as_u64() - 1) / packet_size.as_u64()
            );

            let mut expected_offset = 0u64;
            for packet in &packets {
                prop_assert_eq!(packet.offset, expected_offset);
                prop_assert!(packet.len > 0);
                prop_assert!(packet.len <= packet_size.get());
                expected_offset += packet.len as u64;
            }
            prop_assert_eq!(expected_offset, file_size);
        }
    }

    #[test]
    fn test_empty_file_has_no_packets() {
        let plan = PacketPlan::new(0, PacketSize::default());
        assert_eq!(plan.packet_count(), 0);
        assert_eq!(plan.packets().count(), 0);
    }

    #[test]
    fn test_last_packet_is_short() {
        let plan = PacketPlan::new(100_000, PacketSize::new(32 * 1024).unwrap());
        assert_eq!(plan.packet_count(), 4);
        assert_eq!(plan.packet_len(0), 32 * 1024);
        assert_eq!(plan.packet_len(3), 100_000 - 3 * 32 * 1024);
    }

    #[test]
    fn test_descriptor_matching_ignores_case() {
        let source = SourceDescriptor::new("/Data/Movies/Film.MKV");
        assert!(source.matches(Path::new("/data/movies/film.mkv")));
        assert!(!source.matches(Path::new("/data/movies/film2.mkv")));
        assert_eq!(source.status, SourceStatus::Ready);
        assert_eq!(source.speed_mbps(), None);
        assert_eq!(source.with_speed(2500).speed_mbps(), Some(2.5));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_paths_keep_distinct_keys() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let a = Path::new(OsStr::from_bytes(b"/data/f\xff.bin"));
        let b = Path::new(OsStr::from_bytes(b"/data/f\xfe.bin"));
        assert_ne!(path_key(a), path_key(b));
        assert!(!paths_equal_ignore_case(a, b));
        assert!(paths_equal_ignore_case(a, a));
        assert_eq!(path_key(Path::new("/Data/A.BIN")), OsString::from("/data/a.bin"));
    }

    #[test]
    fn test_job_state_predicates() {
        assert!(JobState::Running.is_running());
        assert!(!JobState::Idle.is_running());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Idle.is_terminal());
    }

    #[test]
    fn test_progress_percent() {
        let progress = PacketProgress {
            file_index: 0,
            file_count: 1,
            source: PathBuf::from("a.bin"),
            completed: 3,
            total: 4,
            bytes_copied: 3 * 1024,
            file_size: 4 * 1024,
        };
        assert_eq!(progress.percent(), 75);
        assert!(!progress.is_file_complete());
    }
}
