//! Copy jobs and the worker that runs them
//!
//! A job owns everything the worker shares with the engine: the cancellation
//! token, the packet counters and the single-assignment outcome slot. Once the
//! slot is filled, by the worker finishing or by the engine abandoning it, the
//! worker can no longer touch the registry or notify observers.

use crate::registry::SourceRegistry;
use packetcopy_io::{prepare_destination, PacketCopier};
use packetcopy_types::{
    BufferSize, Error, FailurePolicy, JobReport, JobState, PacketPlan, PacketProgress, PacketSize,
    ProgressObserver, SourceStatus,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique identifier for a copy job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    /// Create a new job ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settings the worker copies with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopySettings {
    /// Reusable buffer size, bounds one sub-chunk
    pub buffer_size: BufferSize,
    /// Pre-extend destination files
    pub preallocate: bool,
    /// Reaction to a failed packet
    pub failure_policy: FailurePolicy,
}

impl Default for CopySettings {
    fn default() -> Self {
        Self {
            buffer_size: BufferSize::default(),
            preallocate: true,
            failure_policy: FailurePolicy::StopBatch,
        }
    }
}

/// Input of one job, fixed at start
#[derive(Debug, Clone)]
pub(crate) struct JobSpec {
    pub destination: PathBuf,
    pub packet_size: PacketSize,
    pub sources: Vec<PathBuf>,
    pub settings: CopySettings,
}

/// State shared between the engine and one worker
#[derive(Debug)]
pub(crate) struct JobShared {
    pub id: JobId,
    pub cancel: CancellationToken,
    started: Instant,
    started_at: chrono::DateTime<chrono::Utc>,
    completed: AtomicU64,
    total: AtomicU64,
    packets_copied: AtomicU64,
    bytes_copied: AtomicU64,
    outcome: watch::Sender<Option<JobReport>>,
    // Held while the worker touches the registry; `true` until the outcome
    // is set.
    live: Mutex<bool>,
}

impl JobShared {
    pub fn new() -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            id: JobId::new(),
            cancel: CancellationToken::new(),
            started: Instant::now(),
            started_at: chrono::Utc::now(),
            completed: AtomicU64::new(0),
            total: AtomicU64::new(0),
            packets_copied: AtomicU64::new(0),
            bytes_copied: AtomicU64::new(0),
            outcome,
            live: Mutex::new(true),
        }
    }

    /// Current state of this job
    pub fn state(&self) -> JobState {
        self.outcome
            .borrow()
            .as_ref()
            .map_or(JobState::Running, |report| report.state)
    }

    /// Final report, once the job has ended
    pub fn report(&self) -> Option<JobReport> {
        self.outcome.borrow().clone()
    }

    /// Receiver that sees the outcome once it is set
    pub fn subscribe(&self) -> watch::Receiver<Option<JobReport>> {
        self.outcome.subscribe()
    }

    /// Per-file `(completed, total)` packet counters
    pub fn progress(&self) -> (u64, u64) {
        (
            self.completed.load(Ordering::Acquire),
            self.total.load(Ordering::Acquire),
        )
    }

    fn begin_file(&self, total: u64) {
        self.completed.store(0, Ordering::Release);
        self.total.store(total, Ordering::Release);
    }

    fn packet_done(&self, bytes: u64) -> u64 {
        self.packets_copied.fetch_add(1, Ordering::AcqRel);
        self.bytes_copied.fetch_add(bytes, Ordering::AcqRel);
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Check if the outcome is still open
    fn is_live(&self) -> bool {
        *self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` only while the job has not ended or been abandoned
    fn while_live<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if *live {
            Some(f())
        } else {
            None
        }
    }

    /// Publish the outcome if none was published yet; returns the outcome that won
    fn settle(&self, report: JobReport) -> JobReport {
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if *live {
            *live = false;
            self.outcome.send_replace(Some(report.clone()));
            report
        } else {
            self.report().unwrap_or(report)
        }
    }

    /// Worker side: publish the final report
    fn finish(&self, mut report: JobReport) -> JobReport {
        report.duration = self.started.elapsed();
        self.settle(report)
    }

    /// Engine side: detach a worker that ignored cancellation
    pub fn abandon(&self) -> JobReport {
        let mut report = JobReport::new(JobState::Cancelled);
        report.started_at = self.started_at;
        report.duration = self.started.elapsed();
        report.packets_copied = self.packets_copied.load(Ordering::Acquire);
        report.bytes_copied = self.bytes_copied.load(Ordering::Acquire);
        report.error = Some(Error::Cancelled);
        report.abandoned = true;
        self.settle(report)
    }
}

/// How one source ended
enum FileOutcome {
    Copied,
    Skipped(Error),
    Failed(Error),
    Cancelled,
}

/// Worker body: copy every source of the job in order and publish one outcome
pub(crate) fn run_job(
    shared: &JobShared,
    spec: &JobSpec,
    registry: &RwLock<SourceRegistry>,
    observer: &dyn ProgressObserver,
) -> JobReport {
    let mut report = JobReport::new(JobState::Running);
    report.started_at = shared.started_at;

    info!(
        "Job {} copying {} sources to {} in {} packets",
        shared.id,
        spec.sources.len(),
        spec.destination.display(),
        spec.packet_size
    );

    if let Err(e) = fs::create_dir_all(&spec.destination) {
        let error = Error::directory_create(&spec.destination, &e);
        warn!("Job {} failed: {}", shared.id, error);
        report.state = JobState::Failed;
        report.error = Some(error);
        return shared.finish(report);
    }

    let mut copier = PacketCopier::new(spec.settings.buffer_size, shared.cancel.clone());
    let set_status = |path: &Path, status: SourceStatus| {
        shared.while_live(|| {
            registry
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .set_status(path, status)
        });
    };

    report.state = JobState::Completed;
    for (file_index, source) in spec.sources.iter().enumerate() {
        if shared.cancel.is_cancelled() {
            report.state = JobState::Cancelled;
            report.error = Some(Error::Cancelled);
            break;
        }

        set_status(source, SourceStatus::Copying);
        let outcome = copy_source(shared, spec, &mut copier, observer, file_index, source, &mut report);

        match outcome {
            FileOutcome::Copied => {
                set_status(source, SourceStatus::Done);
                report.files_copied += 1;
            }
            FileOutcome::Skipped(error) => {
                warn!("Skipping {}: {}", source.display(), error);
                set_status(source, SourceStatus::Failed);
                report.files_skipped += 1;
                report.warnings.push(error);
            }
            FileOutcome::Failed(error) => {
                set_status(source, SourceStatus::Failed);
                report.files_failed += 1;
                match spec.settings.failure_policy {
                    FailurePolicy::StopBatch => {
                        warn!("Job {} stopped: {}", shared.id, error);
                        report.state = JobState::Failed;
                        report.error = Some(error);
                        break;
                    }
                    FailurePolicy::SkipFile => {
                        warn!("Continuing after failed source: {}", error);
                        report.warnings.push(error);
                    }
                }
            }
            FileOutcome::Cancelled => {
                set_status(source, SourceStatus::Failed);
                report.state = JobState::Cancelled;
                report.error = Some(Error::Cancelled);
                break;
            }
        }
    }

    let report = shared.finish(report);
    info!(
        "Job {} {}: {} copied, {} skipped, {} failed, {} bytes",
        shared.id,
        report.state,
        report.files_copied,
        report.files_skipped,
        report.files_failed,
        report.bytes_copied
    );
    report
}

fn copy_source(
    shared: &JobShared,
    spec: &JobSpec,
    copier: &mut PacketCopier,
    observer: &dyn ProgressObserver,
    file_index: usize,
    source: &Path,
    report: &mut JobReport,
) -> FileOutcome {
    let Some(file_name) = source.file_name() else {
        return FileOutcome::Skipped(Error::SourceStat {
            path: source.to_path_buf(),
            message: "path has no file name".to_string(),
        });
    };
    let target = spec.destination.join(file_name);

    let file_size = match fs::metadata(source) {
        Ok(metadata) if metadata.is_file() => metadata.len(),
        Ok(_) => {
            return FileOutcome::Skipped(Error::SourceStat {
                path: source.to_path_buf(),
                message: "not a regular file".to_string(),
            })
        }
        Err(e) => return FileOutcome::Skipped(Error::source_stat(source, &e)),
    };

    let mut dest = match prepare_destination(&target, file_size, spec.settings.preallocate) {
        Ok(dest) => dest,
        Err(e) => return FileOutcome::Skipped(e),
    };

    let plan = PacketPlan::new(file_size, spec.packet_size);
    let total = plan.packet_count();
    shared.begin_file(total);
    debug!(
        "Copying {} -> {} ({} bytes, {} packets)",
        source.display(),
        target.display(),
        file_size,
        total
    );

    let mut file_bytes = 0u64;
    for packet in plan.packets() {
        if shared.cancel.is_cancelled() {
            return FileOutcome::Cancelled;
        }

        match copier.copy_packet(source, &mut dest, packet) {
            Ok(bytes) => {
                let completed = shared.packet_done(bytes);
                file_bytes += bytes;
                report.packets_copied += 1;
                report.bytes_copied += bytes;

                let progress = PacketProgress {
                    file_index,
                    file_count: spec.sources.len(),
                    source: source.to_path_buf(),
                    completed,
                    total,
                    bytes_copied: file_bytes,
                    file_size,
                };
                if shared.is_live() {
                    observer.on_packet(&progress);
                }
            }
            Err(Error::Cancelled) => return FileOutcome::Cancelled,
            Err(e) => return FileOutcome::Failed(e),
        }
    }

    FileOutcome::Copied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    fn spec(destination: PathBuf, sources: Vec<PathBuf>, packet_size: usize) -> JobSpec {
        JobSpec {
            destination,
            packet_size: PacketSize::new(packet_size).unwrap(),
            sources,
            settings: CopySettings::default(),
        }
    }

    fn registry_for(sources: &[PathBuf]) -> RwLock<SourceRegistry> {
        let mut registry = SourceRegistry::new();
        for source in sources {
            registry.add_source(source.clone());
        }
        RwLock::new(registry)
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
        assert!(!a.as_uuid().is_nil());
    }

    #[test]
    fn test_run_job_reports_per_file_progress() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.bin");
        let b = temp_dir.path().join("b.bin");
        fs::write(&a, vec![1u8; 40 * 1024]).unwrap();
        fs::write(&b, vec![2u8; 16 * 1024]).unwrap();
        let sources = vec![a.clone(), b.clone()];

        let shared = JobShared::new();
        let registry = registry_for(&sources);
        let seen = StdMutex::new(Vec::new());
        let observer = |p: &PacketProgress| seen.lock().unwrap().push((p.file_index, p.completed, p.total));

        let out = temp_dir.path().join("out");
        let report = run_job(&shared, &spec(out.clone(), sources, 16 * 1024), &registry, &observer);

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.files_copied, 2);
        assert_eq!(report.packets_copied, 4);
        assert_eq!(report.bytes_copied, 56 * 1024);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 1, 3), (0, 2, 3), (0, 3, 3), (1, 1, 1)]);
        assert_eq!(fs::read(out.join("a.bin")).unwrap(), fs::read(&a).unwrap());
        assert!(registry
            .read()
            .unwrap()
            .sources()
            .iter()
            .all(|s| s.status == SourceStatus::Done));
        assert_eq!(shared.state(), JobState::Completed);
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("present.bin");
        fs::write(&present, b"data").unwrap();
        let missing = temp_dir.path().join("missing.bin");
        let sources = vec![missing.clone(), present];

        let shared = JobShared::new();
        let registry = registry_for(&sources);
        let observer = |_: &PacketProgress| {};
        let report = run_job(
            &shared,
            &spec(temp_dir.path().join("out"), sources, 16 * 1024),
            &registry,
            &observer,
        );

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.files_copied, 1);
        assert!(matches!(report.warnings[0], Error::SourceStat { .. }));
        assert_eq!(registry.read().unwrap().sources()[0].status, SourceStatus::Failed);
    }

    #[test]
    fn test_destination_that_is_a_file_fails_job() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.bin");
        fs::write(&source, b"data").unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();

        let shared = JobShared::new();
        let registry = registry_for(&[source.clone()]);
        let observer = |_: &PacketProgress| {};
        let report = run_job(&shared, &spec(blocker, vec![source], 16 * 1024), &registry, &observer);

        assert_eq!(report.state, JobState::Failed);
        assert!(matches!(report.error, Some(Error::DirectoryCreate { .. })));
        assert_eq!(report.files_copied, 0);
    }

    #[test]
    fn test_pre_cancelled_job_copies_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.bin");
        fs::write(&source, vec![0u8; 1024]).unwrap();

        let shared = JobShared::new();
        shared.cancel.cancel();
        let registry = registry_for(&[source.clone()]);
        let observer = |_: &PacketProgress| panic!("no packet should be copied");
        let report = run_job(
            &shared,
            &spec(temp_dir.path().join("out"), vec![source], 16 * 1024),
            &registry,
            &observer,
        );

        assert_eq!(report.state, JobState::Cancelled);
        assert_eq!(report.error, Some(Error::Cancelled));
        assert_eq!(report.packets_copied, 0);
    }

    #[test]
    fn test_abandon_wins_over_late_finish() {
        let shared = JobShared::new();
        let abandoned = shared.abandon();
        assert!(abandoned.abandoned);
        assert_eq!(abandoned.state, JobState::Cancelled);

        let late = shared.finish(JobReport::new(JobState::Completed));
        assert_eq!(late, abandoned);
        assert_eq!(shared.state(), JobState::Cancelled);
        assert!(shared.while_live(|| ()).is_none());
    }
}
