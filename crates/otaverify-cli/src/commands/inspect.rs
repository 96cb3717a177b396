//! `otaverify inspect`: header fields and a manifest summary.

use otaverify_payload::{DeltaArchiveManifest, PayloadMetadata};
use serde::Serialize;

use crate::cli::{AppContext, InspectArgs};
use crate::commands::{parse_metadata, read_payload};
use crate::error::CliResult;
use crate::output::{Report, field, render};

#[derive(Debug, Serialize)]
pub(crate) struct InspectReport {
    pub(crate) major_version: u64,
    pub(crate) manifest_offset: usize,
    pub(crate) manifest_size: u64,
    pub(crate) metadata_signature_size: u32,
    pub(crate) metadata_size: u64,
    pub(crate) block_size: Option<u32>,
    pub(crate) minor_version: Option<u32>,
    pub(crate) partitions: Vec<PartitionSummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PartitionSummary {
    pub(crate) name: String,
    pub(crate) new_size: Option<u64>,
    pub(crate) delta: bool,
}

impl InspectReport {
    fn new(metadata: &PayloadMetadata, manifest: &DeltaArchiveManifest) -> Self {
        Self {
            major_version: metadata.major_version(),
            manifest_offset: metadata.manifest_offset(),
            manifest_size: metadata.manifest_size(),
            metadata_signature_size: metadata.metadata_signature_size(),
            metadata_size: metadata.metadata_size(),
            block_size: manifest.block_size,
            minor_version: manifest.minor_version,
            partitions: manifest
                .partitions
                .iter()
                .map(|update| PartitionSummary {
                    name: update.partition_name.clone().unwrap_or_default(),
                    new_size: update.new_partition_info.as_ref().and_then(|info| info.size),
                    delta: update.old_partition_info.is_some(),
                })
                .collect(),
        }
    }
}

impl Report for InspectReport {
    fn table_lines(&self) -> Vec<String> {
        let mut lines = vec![
            field("major version:", self.major_version),
            field("manifest offset:", self.manifest_offset),
            field("manifest size:", self.manifest_size),
            field("metadata signature size:", self.metadata_signature_size),
            field("metadata size:", self.metadata_size),
        ];
        if let Some(block_size) = self.block_size {
            lines.push(field("block size:", block_size));
        }
        lines.push(format!("{:<16} {:>12} KIND", "PARTITION", "SIZE"));
        for partition in &self.partitions {
            let size = partition
                .new_size
                .map_or_else(|| "-".to_string(), |size| size.to_string());
            let kind = if partition.delta { "delta" } else { "full" };
            lines.push(format!("{:<16} {size:>12} {kind}", partition.name));
        }
        lines
    }
}

pub(crate) fn handle(ctx: &AppContext, args: &InspectArgs) -> CliResult<()> {
    render(&inspect(ctx, &read_payload(&args.payload)?)?, ctx.output)
}

pub(crate) fn inspect(ctx: &AppContext, payload: &[u8]) -> CliResult<InspectReport> {
    let metadata = parse_metadata(ctx, payload)?;
    let manifest = metadata.get_manifest(payload)?;
    Ok(InspectReport::new(&metadata, &manifest))
}
