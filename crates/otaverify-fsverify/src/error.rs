//! # Design
//!
//! - Constant-message errors for install plan handling.
//! - Operation, path and field context travel in fields, never in messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for install plan operations.
pub type FsVerifyResult<T> = Result<T, FsVerifyError>;

/// Errors produced while loading, saving or building install plans.
#[derive(Debug, Error)]
pub enum FsVerifyError {
    /// IO failures while reading or writing a plan.
    #[error("install plan io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// JSON encoding or decoding failures.
    #[error("install plan json failure")]
    Json {
        /// Operation that triggered the JSON failure.
        operation: &'static str,
        /// Path involved in the JSON failure.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// A manifest partition lacks data the plan needs.
    #[error("manifest partition incomplete")]
    IncompleteManifest {
        /// Index of the partition in the manifest.
        index: usize,
        /// Manifest field that was missing.
        field: &'static str,
    },
}

impl FsVerifyError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Json {
            operation,
            path: path.into(),
            source,
        }
    }
}
