//! Throughput sampling
//!
//! A file's read speed is estimated from a few timed reads at spread-out
//! offsets. The estimate is only good enough to rank sources against each
//! other; cached files will look fast.

use crate::hint::{open_with_hint, AccessPattern};
use packetcopy_types::{Error, FileSize, Kbps, Result, SpeedMeasurement, ThroughputProbe};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// Sampling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerOptions {
    /// Bytes read per sample
    pub sample_size: usize,
    /// Maximum number of samples per file
    pub sample_count: usize,
}

impl SamplerOptions {
    /// Default bytes per sample (64KB)
    pub const DEFAULT_SAMPLE_SIZE: usize = 64 * 1024;
    /// Default samples per file
    pub const DEFAULT_SAMPLE_COUNT: usize = 3;
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            sample_size: Self::DEFAULT_SAMPLE_SIZE,
            sample_count: Self::DEFAULT_SAMPLE_COUNT,
        }
    }
}

/// Offsets at which a file of `file_size` bytes is sampled.
///
/// Sample `i` targets `(size / (count + 1)) * (i + 1)`, kept at least two
/// samples away from the end. Files up to `count` samples long (and never
/// less than two) are read from the start, and files shorter than one sample
/// get a single read.
pub fn sample_offsets(file_size: FileSize, options: &SamplerOptions) -> Vec<u64> {
    let sample = options.sample_size as u64;
    let count = options.sample_count as u64;
    if count == 0 {
        return Vec::new();
    }
    if file_size < sample {
        return vec![0];
    }
    if file_size <= sample * count.max(2) {
        return vec![0; options.sample_count];
    }

    let step = file_size / (count + 1);
    let last_start = file_size - 2 * sample;
    (1..=count).map(|i| (step * i).min(last_start)).collect()
}

/// Convert one timed read into kilobits per second
fn sample_kbps(bytes: usize, secs: f64) -> f64 {
    (bytes as f64 * 8.0) / (secs * 1000.0)
}

/// Measures read throughput with a reusable sample buffer
#[derive(Debug)]
pub struct ThroughputSampler {
    options: SamplerOptions,
    buffer: Vec<u8>,
}

impl ThroughputSampler {
    /// Create a sampler with default options
    pub fn new() -> Self {
        Self::with_options(SamplerOptions::default())
    }

    /// Create a sampler with custom options
    pub fn with_options(options: SamplerOptions) -> Self {
        Self {
            options,
            buffer: vec![0; options.sample_size],
        }
    }

    /// Sampling options in use
    pub fn options(&self) -> &SamplerOptions {
        &self.options
    }

    /// Estimate the read speed of `path` in kilobits per second
    pub fn measure_speed(&mut self, path: &Path) -> Result<Kbps> {
        let mut file = open_with_hint(path, AccessPattern::Random)
            .map_err(|e| Error::measurement(path, format!("open failed: {}", e)))?;
        let file_size = file
            .metadata()
            .map_err(|e| Error::measurement(path, format!("size unavailable: {}", e)))?
            .len();

        let mut total_kbps = 0.0;
        let mut valid = 0u32;

        for offset in sample_offsets(file_size, &self.options) {
            if file.seek(SeekFrom::Start(offset)).is_err() {
                continue;
            }

            let started = Instant::now();
            let read = match file.read(&mut self.buffer) {
                Ok(read) => read,
                Err(e) => {
                    debug!("Sample read at {} of {} failed: {}", offset, path.display(), e);
                    continue;
                }
            };
            let secs = started.elapsed().as_secs_f64();

            if read > 0 && secs > 0.0 {
                total_kbps += sample_kbps(read, secs);
                valid += 1;
            }
        }

        if valid == 0 {
            return Err(Error::measurement(path, "no sample could be timed"));
        }

        let kbps = (total_kbps / f64::from(valid)).max(0.0) as Kbps;
        debug!("Measured {} at {} kbps from {} samples", path.display(), kbps, valid);
        Ok(kbps)
    }
}

impl Default for ThroughputSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ThroughputProbe for ThroughputSampler {
    fn measure(&mut self, path: &Path) -> Result<u64> {
        self.measure_speed(path)
    }
}

/// Measure `path` with a default sampler
pub fn measure_speed(path: impl AsRef<Path>) -> Result<Kbps> {
    ThroughputSampler::new().measure_speed(path.as_ref())
}

/// Measure every path and reorder `paths` fastest first.
///
/// Paths that cannot be measured rank below every measured one but never fail
/// the batch. The sort is stable, so equal speeds keep their input order. The
/// measurements are returned in the new order.
pub fn measure_and_sort<P>(probe: &mut P, paths: &mut Vec<PathBuf>) -> Result<Vec<SpeedMeasurement>>
where
    P: ThroughputProbe + ?Sized,
{
    if paths.is_empty() {
        return Err(Error::NoSources);
    }

    let mut measurements: Vec<SpeedMeasurement> = paths
        .iter()
        .map(|path| {
            let kbps = match probe.measure(path) {
                Ok(kbps) => Some(kbps),
                Err(e) => {
                    warn!("Could not measure {}: {}", path.display(), e);
                    None
                }
            };
            SpeedMeasurement {
                path: path.clone(),
                kbps,
            }
        })
        .collect();

    measurements.sort_by(|a, b| b.rank_key().cmp(&a.rank_key()));
    *paths = measurements.iter().map(|m| m.path.clone()).collect();

    Ok(measurements)
}
