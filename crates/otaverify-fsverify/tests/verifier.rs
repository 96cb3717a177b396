use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Result, bail};
use otaverify_action::{
    ActionProcessor, ActionProcessorDelegate, CollectedObject, CollectorAction, ErrorCode,
    FeederAction, bond_actions,
};
use otaverify_events::{Event, EventBus};
use otaverify_fsverify::{
    CleanupMonitor, FilesystemVerifierAction, InstallPlan, Partition, VerificationState,
    VerifierSettings,
};
use otaverify_telemetry::Metrics;
use otaverify_test_support::fixtures::{image_bytes, sha256, temp_dir, write_image};

#[derive(Default)]
struct Outcome {
    done: Mutex<Option<ErrorCode>>,
    stopped: Mutex<bool>,
}

impl Outcome {
    fn done(&self) -> Option<ErrorCode> {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ActionProcessorDelegate for Outcome {
    fn processing_done(&self, code: ErrorCode) {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner) = Some(code);
    }

    fn processing_stopped(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }
}

struct Pipeline {
    processor: ActionProcessor,
    outcome: Arc<Outcome>,
    collected: CollectedObject<InstallPlan>,
    monitor: CleanupMonitor,
    events: EventBus,
    metrics: Metrics,
}

impl Pipeline {
    fn new(plan: Option<InstallPlan>, chunk_size: usize) -> Result<Self> {
        let events = EventBus::with_capacity(64);
        let metrics = Metrics::new()?;
        let mut verifier =
            FilesystemVerifierAction::new(VerifierSettings::with_chunk_size(chunk_size))
                .with_events(events.clone())
                .with_metrics(metrics.clone());
        let mut collector = CollectorAction::new();
        bond_actions(&mut verifier, &mut collector);
        let monitor = verifier.cleanup_monitor();
        let collected = collector.collected();

        let outcome = Arc::new(Outcome::default());
        let mut processor = ActionProcessor::new();
        processor.set_delegate(outcome.clone());
        if let Some(plan) = plan {
            let mut feeder = FeederAction::new(plan);
            bond_actions(&mut feeder, &mut verifier);
            processor.enqueue_action(Box::new(feeder));
        }
        processor.enqueue_action(Box::new(verifier));
        processor.enqueue_action(Box::new(collector));

        Ok(Self {
            processor,
            outcome,
            collected,
            monitor,
            events,
            metrics,
        })
    }

    async fn run(mut self) -> Self {
        self.processor.start_processing();
        self.processor.run_to_completion().await;
        self
    }

    /// `(partition, step, matched)` for every hashed image, in order.
    fn hashed(&self) -> Vec<(String, String, bool)> {
        self.events
            .backlog_since(0)
            .into_iter()
            .filter_map(|envelope| match envelope.event {
                Event::PartitionHashed {
                    partition,
                    step,
                    matched,
                } => Some((partition, step, matched)),
                _ => None,
            })
            .collect()
    }

    /// Start processing and hand control to the verifier.
    async fn start_verifier(&mut self) -> Result<()> {
        self.processor.start_processing();
        self.processor.next_completion().await;
        if self.processor.current_action_type() != Some("FilesystemVerifierAction") {
            bail!("verifier did not start");
        }
        Ok(())
    }

    /// Yield until the verifier has hashed at least one chunk.
    async fn wait_for_progress(&self) -> Result<u64> {
        let wait = async {
            loop {
                let hashed = self.metrics.snapshot().bytes_hashed_total;
                if hashed > 0 {
                    return hashed;
                }
                tokio::task::yield_now().await;
            }
        };
        Ok(tokio::time::timeout(Duration::from_secs(10), wait).await?)
    }
}

fn partition(name: &str, target: &Path, target_data: &[u8], target_hash: Vec<u8>) -> Partition {
    Partition {
        name: name.to_string(),
        target_path: target.to_path_buf(),
        target_size: u64::try_from(target_data.len()).unwrap_or(u64::MAX),
        target_hash,
        ..Partition::default()
    }
}

fn with_source(mut partition: Partition, source: PathBuf, data: &[u8], hash: Vec<u8>) -> Partition {
    partition.source_path = source;
    partition.source_size = u64::try_from(data.len()).unwrap_or(u64::MAX);
    partition.source_hash = hash;
    partition
}

#[tokio::test]
async fn empty_plan_succeeds_and_is_forwarded() -> Result<()> {
    let pipeline = Pipeline::new(Some(InstallPlan::default()), 4096)?.run().await;

    assert_eq!(pipeline.outcome.done(), Some(ErrorCode::Success));
    assert_eq!(pipeline.collected.take(), Some(InstallPlan::default()));
    assert!(pipeline.hashed().is_empty());
    assert_eq!(pipeline.monitor.state(), VerificationState::Idle);
    Ok(())
}

#[tokio::test]
async fn missing_plan_fails_with_generic_error() -> Result<()> {
    let pipeline = Pipeline::new(None, 4096)?.run().await;

    assert_eq!(pipeline.outcome.done(), Some(ErrorCode::Error));
    assert!(!pipeline.collected.is_set());
    Ok(())
}

#[tokio::test]
async fn matching_target_is_verified_without_reading_source() -> Result<()> {
    let dir = temp_dir()?;
    let data = image_bytes(10_000, 1);
    let target = write_image(dir.path(), "a.img", &data)?;
    let plan = InstallPlan {
        partitions: vec![with_source(
            partition("A", &target, &data, sha256(&data)),
            dir.path().join("never-opened.img"),
            &data,
            sha256(b"A prime"),
        )],
    };

    let pipeline = Pipeline::new(Some(plan.clone()), 4096)?.run().await;

    assert_eq!(pipeline.outcome.done(), Some(ErrorCode::Success));
    assert_eq!(pipeline.hashed(), vec![("A".into(), "target".into(), true)]);
    assert_eq!(pipeline.collected.take(), Some(plan));
    assert_eq!(pipeline.monitor.state(), VerificationState::Cleaned);
    assert_eq!(pipeline.metrics.snapshot().bytes_hashed_total, 10_000);
    Ok(())
}

#[tokio::test]
async fn target_mismatch_without_source_hash_fails_without_reading_source() -> Result<()> {
    let dir = temp_dir()?;
    let data = image_bytes(5_000, 2);
    let target = write_image(dir.path(), "boot.img", &data)?;
    let mut boot = partition("boot", &target, &data, sha256(b"something else"));
    boot.source_path = dir.path().join("never-opened.img");

    let pipeline = Pipeline::new(Some(InstallPlan { partitions: vec![boot] }), 4096)?
        .run()
        .await;

    assert_eq!(
        pipeline.outcome.done(),
        Some(ErrorCode::NewRootfsVerificationError)
    );
    assert_eq!(
        pipeline.hashed(),
        vec![("boot".into(), "target".into(), false)]
    );
    assert!(!pipeline.collected.is_set());
    Ok(())
}

#[tokio::test]
async fn intact_source_still_reports_new_image_failure() -> Result<()> {
    let dir = temp_dir()?;
    let untouched = image_bytes(9_000, 3);
    let target = write_image(dir.path(), "target.img", &untouched)?;
    let source = write_image(dir.path(), "source.img", &untouched)?;
    let plan = InstallPlan {
        partitions: vec![with_source(
            partition("A", &target, &untouched, sha256(b"X")),
            source,
            &untouched,
            sha256(&untouched),
        )],
    };

    let pipeline = Pipeline::new(Some(plan), 2048)?.run().await;

    assert_eq!(
        pipeline.outcome.done(),
        Some(ErrorCode::NewRootfsVerificationError)
    );
    assert_eq!(
        pipeline.hashed(),
        vec![
            ("A".into(), "target".into(), false),
            ("A".into(), "source".into(), true),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn mismatched_source_reports_stale_device_state() -> Result<()> {
    let dir = temp_dir()?;
    let written = image_bytes(3_000, 4);
    let original = image_bytes(3_000, 5);
    let target = write_image(dir.path(), "target.img", &written)?;
    let source = write_image(dir.path(), "source.img", &original)?;
    let plan = InstallPlan {
        partitions: vec![with_source(
            partition("system", &target, &written, sha256(b"expected new")),
            source,
            &original,
            sha256(b"expected old"),
        )],
    };

    let pipeline = Pipeline::new(Some(plan), 1024)?.run().await;

    assert_eq!(
        pipeline.outcome.done(),
        Some(ErrorCode::DownloadStateInitializationError)
    );
    assert_eq!(pipeline.hashed().len(), 2);
    Ok(())
}

#[tokio::test]
async fn partitions_are_verified_in_plan_order() -> Result<()> {
    let dir = temp_dir()?;
    let mut partitions = Vec::new();
    for (index, name) in ["system", "vendor", "boot"].into_iter().enumerate() {
        let data = image_bytes(1_500 * (index + 1), u8::try_from(index)?);
        let path = write_image(dir.path(), &format!("{name}.img"), &data)?;
        partitions.push(partition(name, &path, &data, sha256(&data)));
    }

    let pipeline = Pipeline::new(Some(InstallPlan { partitions }), 1000)?
        .run()
        .await;

    assert_eq!(pipeline.outcome.done(), Some(ErrorCode::Success));
    let order: Vec<_> = pipeline
        .hashed()
        .into_iter()
        .map(|(partition, _, _)| partition)
        .collect();
    assert_eq!(order, ["system", "vendor", "boot"]);
    Ok(())
}

#[tokio::test]
async fn short_missing_and_unnamed_images_fail_verification() -> Result<()> {
    let dir = temp_dir()?;
    let data = image_bytes(2_000, 6);
    let path = write_image(dir.path(), "short.img", &data)?;

    let mut short = partition("short", &path, &data, sha256(&data));
    short.target_size = 4_000;
    let missing = partition("missing", &dir.path().join("absent.img"), &data, sha256(&data));
    let unnamed = partition("unnamed", Path::new(""), &data, sha256(&data));

    for broken in [short, missing, unnamed] {
        let pipeline = Pipeline::new(
            Some(InstallPlan {
                partitions: vec![broken],
            }),
            512,
        )?
        .run()
        .await;
        assert_eq!(
            pipeline.outcome.done(),
            Some(ErrorCode::FilesystemVerifierError)
        );
        assert!(!pipeline.collected.is_set());
        assert!(!pipeline.monitor.is_cleanup_pending());
    }
    Ok(())
}

#[tokio::test]
async fn terminate_during_reads_cleans_up_without_forwarding() -> Result<()> {
    let dir = temp_dir()?;
    let data = image_bytes(4 * 1024 * 1024, 7);
    let target = write_image(dir.path(), "large.img", &data)?;
    let plan = InstallPlan {
        partitions: vec![partition("large", &target, &data, sha256(&data))],
    };
    let mut pipeline = Pipeline::new(Some(plan), 4096)?;

    pipeline.start_verifier().await?;
    pipeline.wait_for_progress().await?;
    assert!(pipeline.monitor.is_cleanup_pending());

    pipeline.processor.stop_processing();
    assert_eq!(pipeline.monitor.state(), VerificationState::CancelRequested);
    tokio::time::timeout(Duration::from_secs(10), pipeline.monitor.wait_cleaned()).await?;

    assert!(!pipeline.monitor.is_cleanup_pending());
    assert_eq!(pipeline.monitor.state(), VerificationState::Cleaned);
    pipeline.processor.drain_ready();
    assert!(pipeline.outcome.stopped());
    assert_eq!(pipeline.outcome.done(), None);
    assert!(!pipeline.collected.is_set());
    assert!(pipeline.metrics.snapshot().bytes_hashed_total < 4 * 1024 * 1024);
    Ok(())
}

#[tokio::test]
async fn suspended_pass_pauses_until_resumed() -> Result<()> {
    let dir = temp_dir()?;
    let data = image_bytes(2 * 1024 * 1024, 8);
    let target = write_image(dir.path(), "large.img", &data)?;
    let plan = InstallPlan {
        partitions: vec![partition("large", &target, &data, sha256(&data))],
    };
    let mut pipeline = Pipeline::new(Some(plan.clone()), 4096)?;

    pipeline.start_verifier().await?;
    pipeline.wait_for_progress().await?;
    pipeline.processor.suspend_processing();
    assert_eq!(pipeline.monitor.state(), VerificationState::Suspended);
    assert!(pipeline.processor.is_running());

    let paused_at = pipeline.metrics.snapshot().bytes_hashed_total;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pipeline.metrics.snapshot().bytes_hashed_total, paused_at);
    assert!(pipeline.monitor.is_cleanup_pending());

    pipeline.processor.resume_processing();
    pipeline.processor.run_to_completion().await;

    assert_eq!(pipeline.outcome.done(), Some(ErrorCode::Success));
    assert_eq!(pipeline.collected.take(), Some(plan));
    assert_eq!(
        pipeline.metrics.snapshot().bytes_hashed_total,
        2 * 1024 * 1024
    );
    Ok(())
}
