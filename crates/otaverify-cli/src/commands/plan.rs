//! `otaverify plan`: derive an install plan from a payload manifest.

use otaverify_fsverify::{DirectoryResolver, InstallPlan};
use serde::Serialize;
use tracing::info;

use crate::cli::{AppContext, PlanArgs};
use crate::commands::{parse_metadata, read_payload};
use crate::error::{CliError, CliResult};
use crate::output::{Report, render};

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub(crate) struct PlanReport(pub(crate) InstallPlan);

impl Report for PlanReport {
    fn table_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("{:<16} {:>12} {:<6} TARGET", "PARTITION", "SIZE", "SOURCE")];
        for partition in &self.0.partitions {
            let source = if partition.source_hash.is_empty() {
                "no"
            } else {
                "yes"
            };
            lines.push(format!(
                "{:<16} {:>12} {source:<6} {}",
                partition.name,
                partition.target_size,
                partition.target_path.display()
            ));
        }
        lines
    }
}

pub(crate) fn handle(ctx: &AppContext, args: &PlanArgs) -> CliResult<()> {
    let plan = build(ctx, args)?;
    match &args.out {
        Some(out) => {
            plan.save(out).map_err(CliError::failure)?;
            info!(path = %out.display(), partitions = plan.partitions.len(), "install plan written");
            Ok(())
        }
        None => render(&PlanReport(plan), ctx.output),
    }
}

pub(crate) fn build(ctx: &AppContext, args: &PlanArgs) -> CliResult<InstallPlan> {
    let payload = read_payload(&args.payload)?;
    let metadata = parse_metadata(ctx, &payload)?;
    let manifest = metadata.get_manifest(&payload)?;
    let resolver = DirectoryResolver::new(&args.source_dir, &args.target_dir);
    InstallPlan::from_manifest(&manifest, &resolver).map_err(CliError::failure)
}
