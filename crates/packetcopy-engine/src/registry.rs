//! Ordered set of source files
//!
//! The registry is plain data. The engine wraps it in a lock and refuses to
//! mutate it while a job is running.

use packetcopy_types::{path_key, SourceDescriptor, SourceStatus, SpeedMeasurement};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Ordered collection of [`SourceDescriptor`]s with case-insensitive path identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if no source is registered
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Check if `path` is registered, ignoring case
    pub fn contains(&self, path: &Path) -> bool {
        self.sources.iter().any(|source| source.matches(path))
    }

    /// Append `path` as a ready source with unknown speed.
    ///
    /// Returns `false` when the path is already registered.
    pub fn add_source(&mut self, path: impl Into<PathBuf>) -> bool {
        self.add_source_with_info(SourceDescriptor::new(path))
    }

    /// Append a descriptor, keeping its status and speed.
    ///
    /// Returns `false` when the path is already registered.
    pub fn add_source_with_info(&mut self, descriptor: SourceDescriptor) -> bool {
        if self.contains(&descriptor.path) {
            debug!("Ignoring duplicate source {}", descriptor.path.display());
            return false;
        }
        self.sources.push(descriptor);
        true
    }

    /// Register the regular files of a directory.
    ///
    /// Subdirectories are descended only when `recursive`. Symbolic links are
    /// not followed. Returns the number of files actually added.
    pub fn add_directory(&mut self, path: impl AsRef<Path>, recursive: bool) -> usize {
        let path = path.as_ref();
        let mut walker = WalkDir::new(path)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut added = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", path.display(), e);
                    continue;
                }
            };
            if entry.file_type().is_file() && self.add_source(entry.into_path()) {
                added += 1;
            }
        }

        debug!("Added {} files from {}", added, path.display());
        added
    }

    /// Remove the source at `index`; out-of-range indices are ignored
    pub fn remove_source(&mut self, index: usize) -> Option<SourceDescriptor> {
        (index < self.sources.len()).then(|| self.sources.remove(index))
    }

    /// Remove every source
    pub fn clear_sources(&mut self) {
        self.sources.clear();
    }

    /// Registered sources in order
    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Paths of the registered sources in order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.sources.iter().map(|s| s.path.clone()).collect()
    }

    /// Update the status of the source registered under `path`
    pub fn set_status(&mut self, path: &Path, status: SourceStatus) -> bool {
        match self.sources.iter_mut().find(|s| s.matches(path)) {
            Some(source) => {
                source.status = status;
                true
            }
            None => false,
        }
    }

    /// Reset every source to [`SourceStatus::Ready`]
    pub fn reset_statuses(&mut self) {
        for source in &mut self.sources {
            source.status = SourceStatus::Ready;
        }
    }

    /// Mark every [`SourceStatus::Copying`] source failed.
    ///
    /// Used when a worker is abandoned mid-file and can no longer finish the
    /// status transition itself. Returns the number of sources changed.
    pub fn fail_in_progress(&mut self) -> usize {
        let mut changed = 0;
        for source in &mut self.sources {
            if source.status == SourceStatus::Copying {
                source.status = SourceStatus::Failed;
                changed += 1;
            }
        }
        changed
    }

    /// Record measured speeds and rebuild the registry in measurement order.
    ///
    /// Failed measurements record a speed of 0. Sources missing from
    /// `measurements` keep their relative order after the ranked ones.
    pub fn apply_ranking(&mut self, measurements: &[SpeedMeasurement]) {
        let original_order: Vec<OsString> = self.sources.iter().map(|s| path_key(&s.path)).collect();
        let mut by_key: HashMap<OsString, SourceDescriptor> = self
            .sources
            .drain(..)
            .map(|source| (path_key(&source.path), source))
            .collect();

        let mut ranked = Self::new();
        for measurement in measurements {
            if let Some(source) = by_key.remove(&path_key(&measurement.path)) {
                ranked.add_source_with_info(source.with_speed(measurement.kbps.unwrap_or(0)));
            }
        }
        for key in original_order {
            if let Some(source) = by_key.remove(&key) {
                ranked.add_source_with_info(source);
            }
        }

        *self = ranked;
    }
}
