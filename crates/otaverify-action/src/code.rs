//! Completion codes reported by actions and payload checks.

use std::fmt::{self, Display, Formatter};

/// Outcome reported when an action finishes.
///
/// Numeric values are stable and shared with existing update tooling, so they
/// must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The action finished successfully.
    Success,
    /// Generic failure (missing input, I/O error, cancellation).
    Error,
    /// Copying or reading a filesystem image failed.
    FilesystemCopierError,
    /// The whole-payload signature did not verify.
    DownloadPayloadVerificationError,
    /// A freshly written partition does not hash to its expected digest.
    NewRootfsVerificationError,
    /// The device source partitions do not match what the delta expects.
    DownloadStateInitializationError,
    /// The payload does not start with the expected magic.
    DownloadInvalidMetadataMagicString,
    /// The manifest could not be decoded.
    DownloadManifestParseError,
    /// The metadata signature could not be read or decoded.
    DownloadMetadataSignatureError,
    /// The metadata digest could not be computed or padded.
    DownloadMetadataSignatureVerificationError,
    /// The metadata signature does not match the metadata digest.
    DownloadMetadataSignatureMismatch,
    /// The metadata size declared in the header is invalid.
    DownloadInvalidMetadataSize,
    /// No metadata signature was available from any source.
    DownloadMetadataSignatureMissingError,
    /// The payload major version is not supported.
    UnsupportedMajorPayloadVersion,
    /// A partition could not be opened or read to its declared size.
    FilesystemVerifierError,
    /// The user cancelled the operation.
    UserCanceled,
}

impl ErrorCode {
    /// Stable numeric value of the code.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Success => 0,
            Self::Error => 1,
            Self::FilesystemCopierError => 4,
            Self::DownloadPayloadVerificationError => 12,
            Self::NewRootfsVerificationError => 15,
            Self::DownloadStateInitializationError => 20,
            Self::DownloadInvalidMetadataMagicString => 21,
            Self::DownloadManifestParseError => 23,
            Self::DownloadMetadataSignatureError => 24,
            Self::DownloadMetadataSignatureVerificationError => 25,
            Self::DownloadMetadataSignatureMismatch => 26,
            Self::DownloadInvalidMetadataSize => 32,
            Self::DownloadMetadataSignatureMissingError => 39,
            Self::UnsupportedMajorPayloadVersion => 44,
            Self::FilesystemVerifierError => 47,
            Self::UserCanceled => 48,
        }
    }

    /// Snake-case label used in logs, events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::FilesystemCopierError => "filesystem_copier_error",
            Self::DownloadPayloadVerificationError => "download_payload_verification_error",
            Self::NewRootfsVerificationError => "new_rootfs_verification_error",
            Self::DownloadStateInitializationError => "download_state_initialization_error",
            Self::DownloadInvalidMetadataMagicString => "download_invalid_metadata_magic_string",
            Self::DownloadManifestParseError => "download_manifest_parse_error",
            Self::DownloadMetadataSignatureError => "download_metadata_signature_error",
            Self::DownloadMetadataSignatureVerificationError => {
                "download_metadata_signature_verification_error"
            }
            Self::DownloadMetadataSignatureMismatch => "download_metadata_signature_mismatch",
            Self::DownloadInvalidMetadataSize => "download_invalid_metadata_size",
            Self::DownloadMetadataSignatureMissingError => {
                "download_metadata_signature_missing_error"
            }
            Self::UnsupportedMajorPayloadVersion => "unsupported_major_payload_version",
            Self::FilesystemVerifierError => "filesystem_verifier_error",
            Self::UserCanceled => "user_canceled",
        }
    }

    /// Whether the code reports success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl Display for ErrorCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} ({})", self.as_str(), self.as_u32())
    }
}
