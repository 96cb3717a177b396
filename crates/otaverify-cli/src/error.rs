//! CLI error type separating usage problems from failed verification.

use std::fmt::{self, Display, Formatter};

use otaverify_action::ErrorCode;
use otaverify_payload::PayloadError;

/// Exit code for bad arguments or configuration.
pub(crate) const EXIT_USAGE: i32 = 2;
/// Exit code for failed verification or I/O.
pub(crate) const EXIT_FAILURE: i32 = 1;

#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
    Verification {
        code: ErrorCode,
        error: anyhow::Error,
    },
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) fn verification(code: ErrorCode, error: impl Into<anyhow::Error>) -> Self {
        Self::Verification {
            code,
            error: error.into(),
        }
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => EXIT_USAGE,
            Self::Failure(_) | Self::Verification { .. } => EXIT_FAILURE,
        }
    }

    pub(crate) const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Verification { code, .. } => Some(*code),
            Self::Validation(_) | Self::Failure(_) => None,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
            Self::Verification { code, error } => format!("{error:#} [{code}]"),
        }
    }
}

impl From<PayloadError> for CliError {
    fn from(error: PayloadError) -> Self {
        Self::verification(error.code(), error)
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn exit_codes_split_usage_from_failure() {
        assert_eq!(CliError::validation("bad flag").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("disk")).exit_code(), 1);
        let mismatch = CliError::from(PayloadError::MetadataSignatureMismatch);
        assert_eq!(mismatch.exit_code(), 1);
        assert_eq!(
            mismatch.code(),
            Some(ErrorCode::DownloadMetadataSignatureMismatch)
        );
        assert!(mismatch.display_message().contains("(26)"));
    }
}
