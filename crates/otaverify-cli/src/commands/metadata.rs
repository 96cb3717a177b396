//! `otaverify verify-metadata`: metadata and whole-payload signature checks.

use std::path::PathBuf;

use otaverify_events::Event;
use otaverify_payload::{PayloadResult, RsaPayloadKey};
use serde::Serialize;
use tracing::info;

use crate::cli::{AppContext, VerifyMetadataArgs};
use crate::commands::{parse_metadata, read_payload};
use crate::error::{CliError, CliResult};
use crate::output::{Report, field, render};

#[derive(Debug, Serialize)]
pub(crate) struct MetadataReport {
    pub(crate) public_key: PathBuf,
    pub(crate) major_version: u64,
    pub(crate) metadata_size: u64,
    pub(crate) out_of_band: bool,
    pub(crate) payload_signature: bool,
}

impl Report for MetadataReport {
    fn table_lines(&self) -> Vec<String> {
        let source = if self.out_of_band {
            "out of band"
        } else {
            "in payload"
        };
        let mut lines = vec![
            field("public key:", self.public_key.display()),
            field("major version:", self.major_version),
            field("metadata size:", self.metadata_size),
            field("metadata signature:", format!("verified ({source})")),
        ];
        if self.payload_signature {
            lines.push(field("payload signature:", "verified"));
        }
        lines
    }
}

pub(crate) fn handle(ctx: &AppContext, args: &VerifyMetadataArgs) -> CliResult<()> {
    render(&verify(ctx, args)?, ctx.output)
}

pub(crate) fn verify(ctx: &AppContext, args: &VerifyMetadataArgs) -> CliResult<MetadataReport> {
    let public_key = args
        .public_key
        .clone()
        .or_else(|| ctx.config.public_key_path.clone())
        .ok_or_else(|| {
            CliError::validation("no public key: pass --public-key or set public_key_path")
        })?;
    let payload = read_payload(&args.payload)?;
    let metadata = parse_metadata(ctx, &payload)?;
    let key = RsaPayloadKey::from_pem_file(&public_key)?;

    let checked = metadata.validate_metadata_signature(&payload, &args.metadata_signature, &key);
    record(ctx, "metadata_signature", &checked);
    checked?;
    let _ = ctx.events.publish(Event::MetadataVerified {
        major_version: metadata.major_version(),
        metadata_size: metadata.metadata_size(),
    });
    info!(
        payload = %args.payload.display(),
        metadata_size = metadata.metadata_size(),
        "metadata signature verified"
    );

    if args.full_payload {
        let manifest = metadata.get_manifest(&payload)?;
        let checked = metadata.verify_payload_signature(&payload, &manifest, &key);
        record(ctx, "payload_signature", &checked);
        checked?;
    }

    Ok(MetadataReport {
        public_key,
        major_version: metadata.major_version(),
        metadata_size: metadata.metadata_size(),
        out_of_band: !args.metadata_signature.trim().is_empty(),
        payload_signature: args.full_payload,
    })
}

fn record(ctx: &AppContext, check: &str, result: &PayloadResult<()>) {
    let outcome = match result {
        Ok(()) => "verified",
        Err(err) => err.code().as_str(),
    };
    ctx.metrics.inc_payload_check(check, outcome);
}
