//! Unified test utilities for PacketCopy integration tests
//!
//! Deterministic data generators, scratch file helpers, a recording progress
//! observer and a scripted throughput probe.

use packetcopy_types::{path_key, Error, PacketProgress, ProgressObserver, Result, ThroughputProbe};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Test data generation patterns
#[derive(Debug, Clone, Copy)]
pub enum TestDataPattern {
    /// All zeros
    Zeros,
    /// Byte `i` holds `i % 256`, so shifted or reordered packets are detected
    Sequential,
    /// Structured data with a longer period than [`TestDataPattern::Sequential`]
    Realistic,
}

/// Generate `size` bytes following `pattern`
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Zeros => vec![0u8; size],
        TestDataPattern::Sequential => (0..size).map(|i| (i % 256) as u8).collect(),
        TestDataPattern::Realistic => (0..size).map(|i| ((i * 7 + 13) % 251) as u8).collect(),
    }
}

/// Create `dir/name` holding `size` bytes of `pattern`
pub fn create_test_file(dir: &Path, name: &str, size: usize, pattern: TestDataPattern) -> PathBuf {
    let file_path = dir.join(name);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).expect("Failed to create test directory");
    }
    fs::write(&file_path, generate_test_data(size, pattern)).expect("Failed to write test file");
    file_path
}

/// Create one realistic file per `(name, size)` entry
pub fn create_batch(dir: &Path, files: &[(&str, usize)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, size)| create_test_file(dir, name, *size, TestDataPattern::Realistic))
        .collect()
}

/// Assert that `copy` holds exactly the bytes of `original`
pub fn assert_same_contents(original: &Path, copy: &Path) {
    let expected = fs::read(original).expect("Failed to read original");
    let actual = fs::read(copy).expect("Failed to read copy");
    assert_eq!(expected.len(), actual.len(), "length of {}", copy.display());
    assert!(expected == actual, "contents of {} differ", copy.display());
}

/// File sizes around the boundaries of a packet size
pub fn packet_edge_sizes(packet_size: usize) -> Vec<usize> {
    vec![
        1,
        packet_size - 1,
        packet_size,
        packet_size + 1,
        3 * packet_size,
        3 * packet_size + 17,
    ]
}

/// Observer that records every notification
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PacketProgress>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far
    pub fn events(&self) -> Vec<PacketProgress> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_packet(&self, progress: &PacketProgress) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(progress.clone());
    }
}

/// Probe that returns scripted speeds; unknown paths fail to measure
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    speeds: HashMap<OsString, u64>,
    calls: usize,
}

impl ScriptedProbe {
    /// Create a probe answering from `(path, kbps)` pairs
    pub fn new<'a>(speeds: impl IntoIterator<Item = (&'a Path, u64)>) -> Self {
        Self {
            speeds: speeds
                .into_iter()
                .map(|(path, kbps)| (path_key(path), kbps))
                .collect(),
            calls: 0,
        }
    }

    /// Number of measurements requested
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl ThroughputProbe for ScriptedProbe {
    fn measure(&mut self, path: &Path) -> Result<u64> {
        self.calls += 1;
        self.speeds
            .get(&path_key(path))
            .copied()
            .ok_or_else(|| Error::measurement(path, "no scripted speed"))
    }
}
