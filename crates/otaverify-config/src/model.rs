//! Typed configuration model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_CHUNK_SIZE, DEFAULT_LOG_LEVEL, DEFAULT_MAJOR_VERSION};

/// Settings shared by the verification commands.
///
/// Every field is optional in the JSON form; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// Bytes read per partition hashing step.
    pub chunk_size: usize,
    /// Payload major version the header parser accepts.
    pub supported_major_version: u64,
    /// PEM public key used for metadata and payload signatures.
    pub public_key_path: Option<PathBuf>,
    /// Log level filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// `json` or `pretty`; inferred from the build profile when absent.
    pub log_format: Option<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            supported_major_version: DEFAULT_MAJOR_VERSION,
            public_key_path: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: None,
        }
    }
}
