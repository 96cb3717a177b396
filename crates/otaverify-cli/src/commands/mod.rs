//! Command handlers and the payload helpers they share.

pub(crate) mod inspect;
pub(crate) mod metadata;
pub(crate) mod partitions;
pub(crate) mod plan;

use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use otaverify_action::ErrorCode;
use otaverify_payload::{HeaderParse, PayloadMetadata};

use crate::cli::AppContext;
use crate::error::{CliError, CliResult};

pub(crate) fn read_payload(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path)
        .with_context(|| format!("failed to read payload {}", path.display()))
        .map_err(CliError::failure)
}

/// Parse the header of a complete payload file, counting the check.
pub(crate) fn parse_metadata(ctx: &AppContext, payload: &[u8]) -> CliResult<PayloadMetadata> {
    let parsed = PayloadMetadata::parse_header(payload, ctx.config.supported_major_version);
    let outcome = match &parsed {
        Ok(HeaderParse::Parsed(_)) => "parsed",
        Ok(HeaderParse::NeedMoreData { .. }) => "truncated",
        Err(_) => "rejected",
    };
    ctx.metrics.inc_payload_check("header", outcome);
    match parsed? {
        HeaderParse::Parsed(metadata) => Ok(metadata),
        HeaderParse::NeedMoreData { required } => Err(CliError::verification(
            ErrorCode::DownloadInvalidMetadataSize,
            anyhow!(
                "payload is {} bytes but its header needs {required}",
                payload.len()
            ),
        )),
    }
}
