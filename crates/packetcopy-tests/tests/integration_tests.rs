//! Integration tests for PacketCopy
//!
//! These tests drive the engine, the sampler and the configuration layer
//! together against real files.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

use packetcopy_config::ConfigLoader;
use packetcopy_engine::{ChannelObserver, CopyEngine, EngineBuilder};
use packetcopy_io::{measure_and_sort, ThroughputSampler};
use packetcopy_tests::{
    assert_same_contents, create_batch, create_test_file, packet_edge_sizes, RecordingObserver,
    ScriptedProbe, TestDataPattern,
};
use packetcopy_types::{
    FailurePolicy, JobState, PacketPlan, PacketProgress, PacketSize, ProgressObserver,
    SourceStatus,
};
use rstest::rstest;
use tokio_test::assert_ok;

const JOB_TIMEOUT: Duration = Duration::from_secs(30);

#[rstest]
#[case(16 * 1024)]
#[case(64 * 1024)]
#[case(1024 * 1024)]
#[tokio::test]
async fn test_batch_copy_matches_sources(#[case] packet_bytes: usize) {
    let temp_dir = TempDir::new().unwrap();
    let source_dir = temp_dir.path().join("src");
    let dest_dir = temp_dir.path().join("dest");
    let packet_size = PacketSize::new(packet_bytes).unwrap();

    let sizes = packet_edge_sizes(packet_bytes);
    let sources: Vec<PathBuf> = sizes
        .iter()
        .enumerate()
        .map(|(i, size)| {
            create_test_file(&source_dir, &format!("file{}.bin", i), *size, TestDataPattern::Sequential)
        })
        .collect();

    let engine = CopyEngine::new();
    for source in &sources {
        assert!(engine.add_source(source));
    }

    let observer = Arc::new(RecordingObserver::new());
    engine.start(&dest_dir, packet_size, observer.clone()).unwrap();
    let report = timeout(JOB_TIMEOUT, engine.wait()).await.unwrap().unwrap();

    assert_eq!(report.state, JobState::Completed);
    assert!(report.is_success());
    assert_eq!(report.files_copied, sources.len() as u64);

    let expected_packets: u64 = sizes
        .iter()
        .map(|size| PacketPlan::new(*size as u64, packet_size).packet_count())
        .sum();
    assert_eq!(report.packets_copied, expected_packets);
    assert_eq!(report.bytes_copied, sizes.iter().sum::<usize>() as u64);

    for source in &sources {
        assert_same_contents(source, &dest_dir.join(source.file_name().unwrap()));
    }

    // One notification per packet, files in order, packets counting up
    let events = observer.events();
    assert_eq!(events.len() as u64, expected_packets);
    let mut previous: Option<&PacketProgress> = None;
    for event in &events {
        match previous {
            Some(p) if p.file_index == event.file_index => {
                assert_eq!(event.completed, p.completed + 1);
            }
            Some(p) => {
                assert!(p.is_file_complete());
                assert_eq!(event.file_index, p.file_index + 1);
                assert_eq!(event.completed, 1);
            }
            None => assert_eq!(event.completed, 1),
        }
        previous = Some(event);
    }
    assert!(previous.unwrap().is_file_complete());

    assert!(engine
        .sources()
        .iter()
        .all(|s| s.status == SourceStatus::Done));
}

#[tokio::test]
async fn test_directory_sources_ranked_then_copied_in_rank_order() {
    let temp_dir = TempDir::new().unwrap();
    let source_dir = temp_dir.path().join("library");
    let dest_dir = temp_dir.path().join("backup");
    let files = create_batch(
        &source_dir,
        &[("a.bin", 20_000), ("b.bin", 40_000), ("nested/c.bin", 30_000)],
    );

    let engine = CopyEngine::new();
    assert_eq!(engine.add_directory(&source_dir, true), 3);

    let mut probe = ScriptedProbe::new([
        (files[0].as_path(), 100),
        (files[1].as_path(), 900),
        (files[2].as_path(), 500),
    ]);
    let measurements = engine.rank_sources(&mut probe).unwrap();
    assert_eq!(probe.calls(), 3);
    assert_eq!(measurements[0].kbps, Some(900));

    let ranked: Vec<PathBuf> = engine.sources().into_iter().map(|s| s.path).collect();
    assert_eq!(ranked, vec![files[1].clone(), files[2].clone(), files[0].clone()]);

    let observer = Arc::new(RecordingObserver::new());
    engine
        .start(&dest_dir, PacketSize::new(16 * 1024).unwrap(), observer.clone())
        .unwrap();
    let report = timeout(JOB_TIMEOUT, engine.wait()).await.unwrap().unwrap();
    assert_eq!(report.files_copied, 3);

    let mut copied_order: Vec<PathBuf> = Vec::new();
    for event in observer.events() {
        if copied_order.last() != Some(&event.source) {
            copied_order.push(event.source.clone());
        }
    }
    assert_eq!(copied_order, ranked);

    // Nested files land flat in the destination
    assert_same_contents(&files[2], &dest_dir.join("c.bin"));
}

#[test]
fn test_sampler_ranks_real_files() {
    let temp_dir = TempDir::new().unwrap();
    let mut paths = create_batch(
        temp_dir.path(),
        &[("small.bin", 1000), ("medium.bin", 100_000), ("large.bin", 1024 * 1024)],
    );
    paths.push(temp_dir.path().join("missing.bin"));

    let mut sampler = ThroughputSampler::new();
    let measurements = measure_and_sort(&mut sampler, &mut paths).unwrap();

    assert_eq!(measurements.len(), 4);
    let reordered: Vec<PathBuf> = measurements.iter().map(|m| m.path.clone()).collect();
    assert_eq!(paths, reordered);

    // The unreadable file ranks last
    assert_eq!(measurements[3].path, temp_dir.path().join("missing.bin"));
    assert!(measurements[3].kbps.is_none());
    assert!(measurements[..3].iter().all(|m| m.kbps.is_some()));
}

#[tokio::test]
async fn test_engine_from_config_file_skips_missing_source() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("packetcopy.yaml");
    fs::write(
        &config_path,
        "copy:\n  packet_size: 16384\n  failure_policy: skip_file\nengine:\n  cancel_grace_period_ms: 250\n",
    )
    .unwrap();

    let config = assert_ok!(ConfigLoader::load_from_file(&config_path));
    assert_eq!(config.copy.failure_policy, FailurePolicy::SkipFile);

    let engine = EngineBuilder::new().with_config(&config).build();
    assert_eq!(engine.options().cancel_grace_period, Duration::from_millis(250));

    let files = create_batch(temp_dir.path(), &[("first.bin", 50_000), ("second.bin", 10_000)]);
    let missing = temp_dir.path().join("gone.bin");
    engine.add_source(&files[0]);
    engine.add_source(&missing);
    engine.add_source(&files[1]);

    let dest_dir = temp_dir.path().join("out");
    engine
        .start(&dest_dir, config.copy.packet_size, Arc::new(RecordingObserver::new()))
        .unwrap();
    let report = timeout(JOB_TIMEOUT, engine.wait()).await.unwrap().unwrap();

    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.files_copied, 2);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.warnings.len(), 1);
    assert_same_contents(&files[1], &dest_dir.join("second.bin"));

    let statuses: Vec<SourceStatus> = engine.sources().iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![SourceStatus::Done, SourceStatus::Failed, SourceStatus::Done]
    );
}

/// Channel observer that slows the worker down so a cancel lands mid-file
struct SlowChannelObserver {
    inner: ChannelObserver,
    delay: Duration,
}

impl ProgressObserver for SlowChannelObserver {
    fn on_packet(&self, progress: &PacketProgress) {
        self.inner.on_packet(progress);
        std::thread::sleep(self.delay);
    }
}

#[tokio::test]
async fn test_cancel_from_consumer_stops_at_packet_boundary() {
    let temp_dir = TempDir::new().unwrap();
    let source = create_test_file(temp_dir.path(), "big.bin", 64 * 16 * 1024, TestDataPattern::Sequential);
    let dest_dir = temp_dir.path().join("out");

    let engine = CopyEngine::new();
    engine.add_source(&source);

    let (inner, mut progress) = ChannelObserver::new();
    let observer = SlowChannelObserver {
        inner,
        delay: Duration::from_millis(20),
    };
    engine
        .start(&dest_dir, PacketSize::new(16 * 1024).unwrap(), Arc::new(observer))
        .unwrap();

    let first = timeout(JOB_TIMEOUT, progress.recv()).await.unwrap().unwrap();
    assert_eq!(first.completed, 1);

    let report = engine.cancel().await.unwrap();
    assert_eq!(report.state, JobState::Cancelled);
    assert!(!report.abandoned);
    assert_eq!(report.files_copied, 0);
    assert!(report.packets_copied >= 1 && report.packets_copied < 64);
    assert_eq!(report.bytes_copied, report.packets_copied * 16 * 1024);
    assert_eq!(engine.state(), JobState::Idle);
    assert_eq!(engine.last_report().unwrap().state, JobState::Cancelled);

    // The channel closes once the worker has released the observer
    let mut remaining = 0;
    while timeout(JOB_TIMEOUT, progress.recv()).await.unwrap().is_some() {
        remaining += 1;
    }
    assert_eq!(1 + remaining, report.packets_copied);

    // Nothing running, a second cancel is a no-op
    assert!(engine.cancel().await.is_none());
}

#[tokio::test]
async fn test_engine_runs_consecutive_jobs() {
    let temp_dir = TempDir::new().unwrap();
    let files = create_batch(temp_dir.path(), &[("one.bin", 70_000), ("two.bin", 5_000)]);
    let dest_dir = temp_dir.path().join("out");
    let packet_size = PacketSize::default();

    let engine = CopyEngine::new();
    engine.add_source(&files[0]);
    engine.start(&dest_dir, packet_size, Arc::new(RecordingObserver::new())).unwrap();
    let first = timeout(JOB_TIMEOUT, engine.wait()).await.unwrap().unwrap();
    assert_eq!(first.files_copied, 1);
    let first_id = engine.current_job_id();

    engine.clear_sources();
    engine.add_source(&files[1]);
    engine.start(&dest_dir, packet_size, Arc::new(RecordingObserver::new())).unwrap();
    let second = timeout(JOB_TIMEOUT, engine.wait()).await.unwrap().unwrap();

    assert_eq!(second.files_copied, 1);
    assert_ne!(engine.current_job_id(), first_id);
    assert_eq!(engine.last_report().unwrap().bytes_copied, 5_000);
    assert_same_contents(&files[0], &dest_dir.join("one.bin"));
    assert_same_contents(&files[1], &dest_dir.join("two.bin"));
}
