//! Access-pattern hints
//!
//! Packets are read front to back, samples jump around the file. Both are passed
//! to the OS when a file is opened: `FILE_FLAG_SEQUENTIAL_SCAN` /
//! `FILE_FLAG_RANDOM_ACCESS` on Windows, `posix_fadvise` on Linux. Elsewhere the
//! hint is ignored.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use tracing::debug;

/// How a file is about to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPattern {
    /// Front-to-back reads
    Sequential,
    /// Reads at scattered offsets
    Random,
}

/// Open `path` read-only with an access hint
pub fn open_with_hint(path: &Path, pattern: AccessPattern) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true);
    apply_open_flags(&mut options, pattern);
    let file = options.open(path)?;
    advise(&file, pattern);
    Ok(file)
}

/// Create or truncate `path` for writing with an access hint
pub fn create_with_hint(path: &Path, pattern: AccessPattern) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    apply_open_flags(&mut options, pattern);
    let file = options.open(path)?;
    advise(&file, pattern);
    Ok(file)
}

#[cfg(windows)]
fn apply_open_flags(options: &mut OpenOptions, pattern: AccessPattern) {
    use std::os::windows::fs::OpenOptionsExt;
    use windows::Win32::Storage::FileSystem::{FILE_FLAG_RANDOM_ACCESS, FILE_FLAG_SEQUENTIAL_SCAN};

    let flags = match pattern {
        AccessPattern::Sequential => FILE_FLAG_SEQUENTIAL_SCAN,
        AccessPattern::Random => FILE_FLAG_RANDOM_ACCESS,
    };
    options.custom_flags(flags.0);
}

#[cfg(not(windows))]
fn apply_open_flags(_options: &mut OpenOptions, _pattern: AccessPattern) {}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn advise(file: &File, pattern: AccessPattern) {
    use std::os::unix::io::AsRawFd;

    let advice = match pattern {
        AccessPattern::Sequential => libc::POSIX_FADV_SEQUENTIAL,
        AccessPattern::Random => libc::POSIX_FADV_RANDOM,
    };
    // SAFETY: the descriptor is owned by `file` and stays open for the call.
    let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, advice) };
    if rc != 0 {
        debug!("posix_fadvise({:?}) failed with errno {}", pattern, rc);
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn advise(_file: &File, pattern: AccessPattern) {
    debug!("No fadvise on this platform, ignoring {:?} hint", pattern);
}
