//! Action that hashes every partition of an install plan.
//!
//! # Design
//! - One pass per action: each partition's target is hashed first; only a
//!   target mismatch with a known source digest triggers a diagnostic hash of
//!   the source for the same partition.
//! - Reads are sequential and never pipelined. Every read completion is a
//!   checkpoint where cancellation and suspension are observed.
//! - The pass never writes to a partition path.

use std::path::Path;
use std::sync::Arc;

use otaverify_action::{
    Action, ActionCompleter, ActionPipe, ActionPipes, ErrorCode, TypedAction,
};
use otaverify_events::{Event, EventBus};
use otaverify_telemetry::Metrics;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::plan::{InstallPlan, Partition};
use crate::state::{CleanupMonitor, VerificationState};

/// Default number of bytes requested per read.
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// Tunables for a verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierSettings {
    /// Upper bound on bytes requested per read.
    pub chunk_size: usize,
}

impl VerifierSettings {
    /// Settings with the given read size; zero is raised to one byte.
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Which image of a partition is being hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierStep {
    /// The freshly written image.
    VerifyTarget,
    /// The pre-update image, checked only to explain a target mismatch.
    VerifySource,
}

impl VerifierStep {
    /// Snake-case label used in logs, events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VerifyTarget => "target",
            Self::VerifySource => "source",
        }
    }
}

/// Verifies partition digests against the install plan it receives.
///
/// Forwards the plan unchanged on success.
pub struct FilesystemVerifierAction {
    settings: VerifierSettings,
    pipes: ActionPipes<InstallPlan, InstallPlan>,
    state: Arc<watch::Sender<VerificationState>>,
    events: Option<EventBus>,
    metrics: Option<Metrics>,
}

impl FilesystemVerifierAction {
    /// Create a verifier with the given settings.
    #[must_use]
    pub fn new(settings: VerifierSettings) -> Self {
        let (state, _) = watch::channel(VerificationState::Idle);
        Self {
            settings,
            pipes: ActionPipes::new(),
            state: Arc::new(state),
            events: None,
            metrics: None,
        }
    }

    /// Publish a [`Event::PartitionHashed`] for every hashed image.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Record hashing counters.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> VerificationState {
        *self.state.borrow()
    }

    /// Whether a stream or hasher is still held; wait for `false` before
    /// freeing anything the pass reads.
    #[must_use]
    pub fn is_cleanup_pending(&self) -> bool {
        self.state().is_cleanup_pending()
    }

    /// Observer that keeps tracking the pass after the action is handed off.
    #[must_use]
    pub fn cleanup_monitor(&self) -> CleanupMonitor {
        CleanupMonitor::new(self.state.subscribe())
    }
}

impl Default for FilesystemVerifierAction {
    fn default() -> Self {
        Self::new(VerifierSettings::default())
    }
}

impl Action for FilesystemVerifierAction {
    fn type_name(&self) -> &'static str {
        "FilesystemVerifierAction"
    }

    fn perform(&mut self, completer: ActionCompleter) {
        let Some(plan) = self.pipes.take_input_object() else {
            error!("filesystem verifier started without an install plan");
            completer.complete(ErrorCode::Error);
            return;
        };
        if plan.partitions.is_empty() {
            info!("install plan has no partitions; nothing to verify");
            let _ = self.pipes.set_output_object(plan);
            completer.complete(ErrorCode::Success);
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            error!("filesystem verifier needs a tokio runtime");
            completer.complete(ErrorCode::Error);
            return;
        };

        info!(
            partitions = plan.partitions.len(),
            chunk_size = self.settings.chunk_size,
            "filesystem verification started"
        );
        let _ = self.state.send_replace(VerificationState::Active);
        let pass = VerificationPass {
            chunk_size: self.settings.chunk_size,
            plan,
            output: self.pipes.output_pipe(),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            metrics: self.metrics.clone(),
        };
        drop(runtime.spawn(pass.run(completer)));
    }

    fn terminate(&mut self) {
        let changed = self.state.send_if_modified(|state| match *state {
            VerificationState::Active | VerificationState::Suspended => {
                *state = VerificationState::CancelRequested;
                true
            }
            VerificationState::Idle => {
                *state = VerificationState::Cleaned;
                true
            }
            VerificationState::CancelRequested | VerificationState::Cleaned => false,
        });
        if changed {
            info!(state = self.state().as_str(), "filesystem verification cancel requested");
        }
    }

    fn suspend(&mut self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == VerificationState::Active {
                *state = VerificationState::Suspended;
                true
            } else {
                false
            }
        });
        if changed {
            debug!("filesystem verification suspended");
        }
    }

    fn resume(&mut self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == VerificationState::Suspended {
                *state = VerificationState::Active;
                true
            } else {
                false
            }
        });
        if changed {
            debug!("filesystem verification resumed");
        }
    }
}

impl TypedAction for FilesystemVerifierAction {
    type Input = InstallPlan;
    type Output = InstallPlan;

    fn pipes_mut(&mut self) -> &mut ActionPipes<InstallPlan, InstallPlan> {
        &mut self.pipes
    }
}

enum Interrupt {
    Cancelled,
    Failed(ErrorCode),
}

struct VerificationPass {
    chunk_size: usize,
    plan: InstallPlan,
    output: Option<ActionPipe<InstallPlan>>,
    state: Arc<watch::Sender<VerificationState>>,
    events: Option<EventBus>,
    metrics: Option<Metrics>,
}

impl VerificationPass {
    async fn run(self, completer: ActionCompleter) {
        let outcome = self.verify_partitions().await;
        let previous = self.state.send_replace(VerificationState::Cleaned);

        match outcome {
            _ if previous == VerificationState::CancelRequested => {
                info!("filesystem verification cancelled");
                completer.abandon();
            }
            Err(Interrupt::Cancelled) => {
                info!("filesystem verification cancelled");
                completer.abandon();
            }
            Err(Interrupt::Failed(code)) => {
                error!(code = code.as_str(), "filesystem verification failed");
                completer.complete(code);
            }
            Ok(()) => {
                info!(
                    partitions = self.plan.partitions.len(),
                    "filesystem verification succeeded"
                );
                if let Some(output) = &self.output {
                    output.set_object(self.plan);
                }
                completer.complete(ErrorCode::Success);
            }
        }
    }

    async fn verify_partitions(&self) -> Result<(), Interrupt> {
        let mut index = 0;
        let mut step = VerifierStep::VerifyTarget;
        while let Some(partition) = self.plan.partitions.get(index) {
            let (path, size, expected) = match step {
                VerifierStep::VerifyTarget => (
                    &partition.target_path,
                    partition.target_size,
                    &partition.target_hash,
                ),
                VerifierStep::VerifySource => (
                    &partition.source_path,
                    partition.source_size,
                    &partition.source_hash,
                ),
            };
            let digest = self.hash_image(partition, step, path, size).await?;
            let matched = digest.as_slice() == expected.as_slice();
            self.record(partition, step, &digest, matched);

            match (step, matched) {
                (VerifierStep::VerifyTarget, true) => index += 1,
                (VerifierStep::VerifyTarget, false) if partition.source_hash.is_empty() => {
                    error!(
                        partition = %partition.name,
                        expected = %hex::encode(expected),
                        actual = %hex::encode(&digest),
                        "new image hash mismatch"
                    );
                    return Err(Interrupt::Failed(ErrorCode::NewRootfsVerificationError));
                }
                (VerifierStep::VerifyTarget, false) => {
                    warn!(
                        partition = %partition.name,
                        "new image hash mismatch; checking source image"
                    );
                    step = VerifierStep::VerifySource;
                }
                (VerifierStep::VerifySource, false) => {
                    error!(
                        partition = %partition.name,
                        expected = %hex::encode(expected),
                        actual = %hex::encode(&digest),
                        "source image hash mismatch; update does not apply to this device"
                    );
                    return Err(Interrupt::Failed(
                        ErrorCode::DownloadStateInitializationError,
                    ));
                }
                (VerifierStep::VerifySource, true) => {
                    error!(
                        partition = %partition.name,
                        "source image intact; new image is corrupt"
                    );
                    return Err(Interrupt::Failed(ErrorCode::NewRootfsVerificationError));
                }
            }
        }
        Ok(())
    }

    async fn hash_image(
        &self,
        partition: &Partition,
        step: VerifierStep,
        path: &Path,
        size: u64,
    ) -> Result<Vec<u8>, Interrupt> {
        self.checkpoint().await?;
        if path.as_os_str().is_empty() {
            error!(partition = %partition.name, step = step.as_str(), "partition path is empty");
            return Err(Interrupt::Failed(ErrorCode::FilesystemVerifierError));
        }
        let mut stream = File::open(path).await.map_err(|source| {
            error!(
                partition = %partition.name,
                path = %path.display(),
                error = %source,
                "failed to open partition image"
            );
            Interrupt::Failed(ErrorCode::FilesystemVerifierError)
        })?;
        debug!(
            partition = %partition.name,
            step = step.as_str(),
            path = %path.display(),
            size,
            "hashing partition image"
        );

        let mut hasher = Sha256::new();
        let mut buffer = vec![0_u8; self.chunk_size];
        let mut remaining = size;
        while remaining > 0 {
            let request = usize::try_from(remaining)
                .map_or(self.chunk_size, |left| left.min(self.chunk_size));
            let read = stream.read(&mut buffer[..request]).await;
            self.checkpoint().await?;
            match read {
                Ok(0) => {
                    error!(
                        partition = %partition.name,
                        path = %path.display(),
                        missing = remaining,
                        "partition image ended before its declared size"
                    );
                    return Err(Interrupt::Failed(ErrorCode::FilesystemVerifierError));
                }
                Ok(count) => {
                    hasher.update(&buffer[..count]);
                    let count = u64::try_from(count).unwrap_or(remaining);
                    remaining = remaining.saturating_sub(count);
                    if let Some(metrics) = &self.metrics {
                        metrics.add_bytes_hashed(count);
                    }
                }
                Err(source) => {
                    error!(
                        partition = %partition.name,
                        path = %path.display(),
                        error = %source,
                        "failed to read partition image"
                    );
                    return Err(Interrupt::Failed(ErrorCode::Error));
                }
            }
        }
        Ok(hasher.finalize().to_vec())
    }

    /// Observe cancellation and wait out suspension at a read boundary.
    async fn checkpoint(&self) -> Result<(), Interrupt> {
        let mut receiver = self.state.subscribe();
        loop {
            let state = *receiver.borrow_and_update();
            match state {
                VerificationState::CancelRequested | VerificationState::Cleaned => {
                    return Err(Interrupt::Cancelled);
                }
                VerificationState::Suspended => {
                    if receiver.changed().await.is_err() {
                        return Err(Interrupt::Cancelled);
                    }
                }
                VerificationState::Active | VerificationState::Idle => return Ok(()),
            }
        }
    }

    fn record(&self, partition: &Partition, step: VerifierStep, digest: &[u8], matched: bool) {
        info!(
            partition = %partition.name,
            step = step.as_str(),
            digest = %hex::encode(digest),
            matched,
            "partition hashed"
        );
        if let Some(metrics) = &self.metrics {
            metrics.inc_partition_hashed(step.as_str(), matched);
        }
        if let Some(events) = &self.events {
            let _ = events.publish(Event::PartitionHashed {
                partition: partition.name.clone(),
                step: step.as_str().to_string(),
                matched,
            });
        }
    }
}
