//! `otaverify verify-partitions`: hash installed images against a plan.
//!
//! The plan runs through `FeederAction -> FilesystemVerifierAction ->
//! CollectorAction` on an [`ActionProcessor`]. Ctrl-C stops the processor and
//! waits for the verifier to release its stream before returning.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;
use otaverify_action::{
    Action, ActionProcessor, ActionProcessorDelegate, CollectorAction, ErrorCode,
    EventBusDelegate, FeederAction, bond_actions,
};
use otaverify_fsverify::{FilesystemVerifierAction, InstallPlan, VerifierSettings};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{AppContext, VerifyPartitionsArgs};
use crate::error::{CliError, CliResult};
use crate::output::{Report, field, render};

#[derive(Debug, Serialize)]
pub(crate) struct PartitionsReport {
    pub(crate) code: &'static str,
    pub(crate) partitions: Vec<String>,
    pub(crate) bytes_hashed: u64,
    pub(crate) images_matched: u64,
    pub(crate) images_mismatched: u64,
}

impl Report for PartitionsReport {
    fn table_lines(&self) -> Vec<String> {
        vec![
            field("result:", self.code),
            field("partitions:", self.partitions.join(", ")),
            field("bytes hashed:", self.bytes_hashed),
            field("images matched:", self.images_matched),
            field("images mismatched:", self.images_mismatched),
        ]
    }
}

/// Forwards to the event bus and keeps the final completion code.
struct OutcomeDelegate {
    events: EventBusDelegate,
    done: Mutex<Option<ErrorCode>>,
}

impl OutcomeDelegate {
    fn code(&self) -> Option<ErrorCode> {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ActionProcessorDelegate for OutcomeDelegate {
    fn processing_done(&self, code: ErrorCode) {
        *self.done.lock().unwrap_or_else(PoisonError::into_inner) = Some(code);
        self.events.processing_done(code);
    }

    fn processing_stopped(&self) {
        self.events.processing_stopped();
    }

    fn action_completed(&self, action: &dyn Action, code: ErrorCode) {
        self.events.action_completed(action, code);
    }

    fn action_started(&self, action: &dyn Action) {
        self.events.action_started(action);
    }
}

pub(crate) async fn handle(ctx: &AppContext, args: &VerifyPartitionsArgs) -> CliResult<()> {
    let plan = InstallPlan::load(&args.plan).map_err(CliError::failure)?;
    let chunk_size = args.chunk_size.unwrap_or(ctx.config.chunk_size);
    if chunk_size == 0 {
        return Err(CliError::validation("--chunk-size must be positive"));
    }
    render(&verify(ctx, plan, chunk_size).await?, ctx.output)
}

pub(crate) async fn verify(
    ctx: &AppContext,
    plan: InstallPlan,
    chunk_size: usize,
) -> CliResult<PartitionsReport> {
    let partitions = plan
        .partitions
        .iter()
        .map(|partition| partition.name.clone())
        .collect();

    let mut feeder = FeederAction::new(plan);
    let mut verifier = FilesystemVerifierAction::new(VerifierSettings::with_chunk_size(chunk_size))
        .with_events(ctx.events.clone())
        .with_metrics(ctx.metrics.clone());
    let mut collector = CollectorAction::new();
    bond_actions(&mut feeder, &mut verifier);
    bond_actions(&mut verifier, &mut collector);
    let mut monitor = verifier.cleanup_monitor();
    let collected = collector.collected();

    let delegate = Arc::new(OutcomeDelegate {
        events: EventBusDelegate::new(ctx.events.clone()).with_metrics(ctx.metrics.clone()),
        done: Mutex::new(None),
    });
    let mut processor = ActionProcessor::new();
    processor.set_delegate(delegate.clone());
    processor.enqueue_action(Box::new(feeder));
    processor.enqueue_action(Box::new(verifier));
    processor.enqueue_action(Box::new(collector));

    processor.start_processing();
    let interrupted = tokio::select! {
        () = processor.run_to_completion() => false,
        Ok(()) = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        warn!("interrupted; cancelling partition verification");
        processor.stop_processing();
        monitor.wait_cleaned().await;
        return Err(CliError::verification(
            ErrorCode::UserCanceled,
            anyhow!("partition verification interrupted"),
        ));
    }

    let code = delegate.code().unwrap_or(ErrorCode::Error);
    if !code.is_success() || !collected.is_set() {
        return Err(CliError::verification(
            code,
            anyhow!("partition verification failed"),
        ));
    }

    let snapshot = ctx.metrics.snapshot();
    info!(
        bytes_hashed = snapshot.bytes_hashed_total,
        "partition verification succeeded"
    );
    Ok(PartitionsReport {
        code: code.as_str(),
        partitions,
        bytes_hashed: snapshot.bytes_hashed_total,
        images_matched: snapshot.partitions_matched_total,
        images_mismatched: snapshot.partitions_mismatched_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use otaverify_fsverify::Partition;
    use otaverify_test_support::fixtures::{image_bytes, sha256, temp_dir, write_image};

    fn plan_for(dir: &std::path::Path, data: &[u8], expected: Vec<u8>) -> anyhow::Result<InstallPlan> {
        let target = write_image(dir, "system.img", data)?;
        Ok(InstallPlan {
            partitions: vec![Partition {
                name: "system".into(),
                target_path: target,
                target_size: u64::try_from(data.len())?,
                target_hash: expected,
                ..Partition::default()
            }],
        })
    }

    #[tokio::test]
    async fn verified_plan_reports_counts() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        let data = image_bytes(20_000, 9);
        let ctx = context()?;

        let report = verify(&ctx, plan_for(dir.path(), &data, sha256(&data))?, 4096).await?;
        assert_eq!(report.code, "success");
        assert_eq!(report.partitions, ["system"]);
        assert_eq!(report.bytes_hashed, 20_000);
        assert_eq!(report.images_matched, 1);

        let kinds: Vec<_> = ctx
            .events
            .backlog_since(0)
            .into_iter()
            .map(|envelope| envelope.event.kind())
            .collect();
        assert!(kinds.contains(&"partition_hashed"));
        assert_eq!(kinds.last(), Some(&"processing_done"));
        Ok(())
    }

    #[tokio::test]
    async fn mismatch_surfaces_the_pipeline_code() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        let data = image_bytes(1_000, 10);
        let ctx = context()?;

        let result = verify(&ctx, plan_for(dir.path(), &data, sha256(b"other"))?, 4096).await;
        let err = result.err();
        assert_eq!(
            err.as_ref().and_then(CliError::code),
            Some(ErrorCode::NewRootfsVerificationError)
        );
        assert_eq!(err.map(|err| err.exit_code()), Some(1));
        Ok(())
    }
}
