//! Main copy engine implementation

use crate::job::{run_job, CopySettings, JobId, JobShared, JobSpec};
use crate::registry::SourceRegistry;
use packetcopy_config::Config;
use packetcopy_io::measure_and_sort;
use packetcopy_types::{
    Error, JobReport, JobState, PacketSize, ProgressObserver, Result, SourceDescriptor,
    SpeedMeasurement, ThroughputProbe,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Engine-wide settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Settings each job copies with
    pub copy: CopySettings,
    /// How long [`CopyEngine::cancel`] waits before abandoning the worker
    pub cancel_grace_period: Duration,
}

impl EngineOptions {
    /// Default cancel grace period
    pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

    /// Derive engine options from the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            copy: CopySettings {
                buffer_size: config.copy.buffer_size,
                preallocate: config.copy.preallocate,
                failure_policy: config.copy.failure_policy,
            },
            cancel_grace_period: config.engine.cancel_grace_period(),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            copy: CopySettings::default(),
            cancel_grace_period: Self::DEFAULT_GRACE_PERIOD,
        }
    }
}

#[derive(Debug)]
struct ActiveJob {
    shared: Arc<JobShared>,
    worker: Option<JoinHandle<()>>,
}

/// Batch copy engine with a single background worker.
///
/// The engine owns the source registry. While a job runs, registry mutations are
/// ignored and a second [`start`](Self::start) fails with [`Error::Busy`].
#[derive(Debug)]
pub struct CopyEngine {
    options: EngineOptions,
    registry: Arc<RwLock<SourceRegistry>>,
    current: Mutex<Option<ActiveJob>>,
}

impl CopyEngine {
    /// Create an engine with default options
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Create an engine with custom options
    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            options,
            registry: Arc::new(RwLock::new(SourceRegistry::new())),
            current: Mutex::new(None),
        }
    }

    /// Create an engine from the loaded configuration
    pub fn with_config(config: &Config) -> Self {
        Self::with_options(EngineOptions::from_config(config))
    }

    /// Engine options in use
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<ActiveJob>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_shared(&self) -> Option<Arc<JobShared>> {
        self.lock_current()
            .as_ref()
            .map(|job| Arc::clone(&job.shared))
    }

    fn running(current: &Option<ActiveJob>) -> bool {
        current
            .as_ref()
            .is_some_and(|job| job.shared.state().is_running())
    }

    /// Apply `f` to the registry unless a job is running
    fn mutate<R>(&self, f: impl FnOnce(&mut SourceRegistry) -> R) -> Option<R> {
        let current = self.lock_current();
        if Self::running(&current) {
            debug!("Registry is locked while a job runs");
            return None;
        }
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut registry))
    }

    /// Register a source file; returns whether it was added
    pub fn add_source(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        self.mutate(|registry| registry.add_source(path))
            .unwrap_or(false)
    }

    /// Register a descriptor with its status and speed; returns whether it was added
    pub fn add_source_with_info(&self, descriptor: SourceDescriptor) -> bool {
        self.mutate(|registry| registry.add_source_with_info(descriptor))
            .unwrap_or(false)
    }

    /// Register the files of a directory; returns how many were added
    pub fn add_directory(&self, path: impl AsRef<Path>, recursive: bool) -> usize {
        self.mutate(|registry| registry.add_directory(path, recursive))
            .unwrap_or(0)
    }

    /// Remove the source at `index`; returns whether one was removed
    pub fn remove_source(&self, index: usize) -> bool {
        self.mutate(|registry| registry.remove_source(index).is_some())
            .unwrap_or(false)
    }

    /// Remove every source
    pub fn clear_sources(&self) {
        self.mutate(SourceRegistry::clear_sources);
    }

    /// Snapshot of the registered sources, including worker status updates
    pub fn sources(&self) -> Vec<SourceDescriptor> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sources()
            .to_vec()
    }

    /// Measure every registered source with `probe`, record the speeds and
    /// reorder the registry fastest first
    pub fn rank_sources<P>(&self, probe: &mut P) -> Result<Vec<SpeedMeasurement>>
    where
        P: ThroughputProbe + ?Sized,
    {
        if self.is_running() {
            return Err(Error::Busy);
        }

        let mut paths = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .paths();
        let measurements = measure_and_sort(probe, &mut paths)?;

        self.mutate(|registry| registry.apply_ranking(&measurements))
            .ok_or(Error::Busy)?;
        info!("Ranked {} sources by read speed", measurements.len());
        Ok(measurements)
    }

    /// Start copying every registered source into `destination`.
    ///
    /// Returns as soon as the worker has been spawned.
    pub fn start(
        &self,
        destination: impl AsRef<Path>,
        packet_size: PacketSize,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<JobId> {
        let mut current = self.lock_current();
        if Self::running(&current) {
            return Err(Error::Busy);
        }

        let destination = destination.as_ref();
        if destination.as_os_str().is_empty() {
            return Err(Error::NoDestination);
        }

        let sources = {
            let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
            if registry.is_empty() {
                return Err(Error::NoSources);
            }
            registry.reset_statuses();
            registry.paths()
        };

        let shared = Arc::new(JobShared::new());
        let id = shared.id;
        let spec = JobSpec {
            destination: destination.to_path_buf(),
            packet_size,
            sources,
            settings: self.options.copy,
        };

        let worker = {
            let shared = Arc::clone(&shared);
            let registry = Arc::clone(&self.registry);
            thread::Builder::new()
                .name("packetcopy-worker".into())
                .spawn(move || {
                    run_job(&shared, &spec, &registry, observer.as_ref());
                })
                .map_err(|e| Error::Scheduling {
                    message: e.to_string(),
                })?
        };

        info!("Started job {} into {}", id, destination.display());
        *current = Some(ActiveJob {
            shared,
            worker: Some(worker),
        });
        Ok(id)
    }

    /// Signal the running job to stop without waiting for it.
    ///
    /// Returns whether a running job was signalled.
    pub fn request_cancel(&self) -> bool {
        let current = self.lock_current();
        match current.as_ref() {
            Some(job) if job.shared.state().is_running() => {
                job.shared.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel the running job and wait up to the grace period for it to stop.
    ///
    /// A worker that does not stop in time is abandoned and the job is reported
    /// cancelled with `abandoned` set. Returns `None` when no job is running.
    pub async fn cancel(&self) -> Option<JobReport> {
        let shared = self
            .current_shared()
            .filter(|shared| shared.state().is_running())?;

        info!("Cancelling job {}", shared.id);
        shared.cancel.cancel();

        let mut outcome = shared.subscribe();
        let settled =
            match tokio::time::timeout(self.options.cancel_grace_period, outcome.wait_for(Option::is_some))
                .await
            {
                Ok(Ok(report)) => report.clone(),
                _ => None,
            };

        let report = match settled {
            Some(report) => report,
            None => {
                warn!(
                    "Worker of job {} did not stop within {:?}, abandoning it",
                    shared.id, self.options.cancel_grace_period
                );
                let report = shared.abandon();
                let interrupted = self
                    .registry
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .fail_in_progress();
                debug!("Marked {} interrupted sources failed", interrupted);
                report
            }
        };

        self.release_worker(&shared);
        Some(report)
    }

    /// Wait for the current job to end and return its report
    pub async fn wait(&self) -> Result<JobReport> {
        let shared = self
            .current_shared()
            .ok_or_else(|| Error::other("No copy job has been started"))?;

        let mut outcome = shared.subscribe();
        let report = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::other("Job outcome channel closed"))?
            .clone();

        self.release_worker(&shared);
        report.ok_or_else(|| Error::other("Job ended without a report"))
    }

    /// Join the worker of `shared` if it has exited, otherwise detach it
    fn release_worker(&self, shared: &Arc<JobShared>) {
        let worker = {
            let mut current = self.lock_current();
            match current.as_mut() {
                Some(job) if Arc::ptr_eq(&job.shared, shared) => job.worker.take(),
                _ => None,
            }
        };

        if let Some(worker) = worker {
            if worker.is_finished() {
                if worker.join().is_err() {
                    warn!("Worker of job {} panicked", shared.id);
                }
            } else {
                debug!("Detaching worker of job {}", shared.id);
            }
        }
    }

    /// Current engine state: [`JobState::Running`] while a job runs,
    /// [`JobState::Idle`] otherwise.
    ///
    /// The terminal state of the last job is available through
    /// [`CopyEngine::last_report`].
    pub fn state(&self) -> JobState {
        let current = self.lock_current();
        if Self::running(&current) {
            JobState::Running
        } else {
            JobState::Idle
        }
    }

    /// Check if a job is running
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Report of the most recent job, once it has ended
    pub fn last_report(&self) -> Option<JobReport> {
        self.lock_current()
            .as_ref()
            .and_then(|job| job.shared.report())
    }

    /// `(completed, total)` packets of the file being copied
    pub fn progress(&self) -> (u64, u64) {
        self.lock_current()
            .as_ref()
            .map_or((0, 0), |job| job.shared.progress())
    }

    /// ID of the most recent job
    pub fn current_job_id(&self) -> Option<JobId> {
        self.lock_current().as_ref().map(|job| job.shared.id)
    }
}

impl Default for CopyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CopyEngine {
    fn drop(&mut self) {
        if self.request_cancel() {
            warn!("Copy engine dropped while a job was running; the job was cancelled");
        }
    }
}

/// Builder for creating a copy engine with custom options
#[derive(Debug, Default)]
pub struct EngineBuilder {
    options: EngineOptions,
}

impl EngineBuilder {
    /// Create a new engine builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every option from the configuration
    pub fn with_config(mut self, config: &Config) -> Self {
        self.options = EngineOptions::from_config(config);
        self
    }

    /// Set the copy settings
    pub fn with_copy_settings(mut self, settings: CopySettings) -> Self {
        self.options.copy = settings;
        self
    }

    /// Set the cancel grace period
    pub fn with_cancel_grace_period(mut self, grace: Duration) -> Self {
        self.options.cancel_grace_period = grace;
        self
    }

    /// Build the copy engine
    pub fn build(self) -> CopyEngine {
        CopyEngine::with_options(self.options)
    }
}
