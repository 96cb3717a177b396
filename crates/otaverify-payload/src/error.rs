//! # Design
//!
//! - Constant-message errors for payload parsing and signature checks.
//! - Sizes and versions travel in fields so callers can report them.
//! - Every variant maps onto exactly one pipeline [`ErrorCode`].

use std::io;
use std::path::PathBuf;

use otaverify_action::ErrorCode;
use thiserror::Error;

/// Result type for payload operations.
pub type PayloadResult<T> = Result<T, PayloadError>;

/// Byte region of a payload that a check reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadRegion {
    /// Serialized manifest following the header.
    Manifest,
    /// Metadata signature following the manifest.
    MetadataSignature,
    /// Data blobs covered by the payload signature.
    Payload,
    /// Payload signature container stored after the data blobs.
    PayloadSignature,
}

impl PayloadRegion {
    /// Snake-case label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::MetadataSignature => "metadata_signature",
            Self::Payload => "payload",
            Self::PayloadSignature => "payload_signature",
        }
    }
}

/// Errors produced while parsing or verifying a payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The buffer does not begin with the payload magic.
    #[error("payload magic mismatch")]
    InvalidMagic {
        /// The four bytes found at the start of the buffer.
        found: [u8; 4],
    },
    /// The header declares a major version this reader cannot handle.
    #[error("unsupported payload major version")]
    UnsupportedVersion {
        /// Version read from the header.
        version: u64,
        /// Version the caller supports besides the legacy one.
        supported: u64,
    },
    /// Header and manifest length do not fit in an addressable size.
    #[error("payload metadata size overflow")]
    MetadataSizeOverflow {
        /// Manifest size read from the header.
        manifest_size: u64,
    },
    /// The buffer ends before the requested region.
    #[error("payload buffer truncated")]
    Truncated {
        /// Region being read.
        region: PayloadRegion,
        /// Bytes required to cover the region.
        required: u64,
        /// Bytes available in the buffer.
        available: usize,
    },
    /// The manifest bytes could not be decoded.
    #[error("payload manifest decode failed")]
    ManifestDecode {
        /// Underlying protobuf decode error.
        source: prost::DecodeError,
    },
    /// The out-of-band signature is not valid base64.
    #[error("metadata signature encoding invalid")]
    SignatureEncoding {
        /// Underlying base64 error.
        source: base64::DecodeError,
    },
    /// A signature container could not be decoded.
    #[error("signature container decode failed")]
    SignatureContainer {
        /// Which signature the container holds.
        region: PayloadRegion,
        /// Underlying protobuf decode error.
        source: prost::DecodeError,
    },
    /// Neither the caller nor the payload supplied a metadata signature.
    #[error("metadata signature missing")]
    MissingMetadataSignature,
    /// The computed digest could not be padded for the key.
    #[error("metadata digest padding failed")]
    DigestPadding {
        /// Static reason for the failure.
        reason: &'static str,
        /// Public key size in bytes.
        key_size: usize,
    },
    /// No metadata signature verified against the computed digest.
    #[error("metadata signature mismatch")]
    MetadataSignatureMismatch,
    /// The public key file could not be read.
    #[error("public key read failed")]
    PublicKeyRead {
        /// Path to the key file.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The public key PEM could not be parsed.
    #[error("public key parse failed")]
    PublicKeyParse {
        /// Path to the key file, when loaded from disk.
        path: Option<PathBuf>,
        /// Underlying SPKI decode error.
        source: rsa::pkcs8::spki::Error,
    },
    /// The manifest does not record where payload signatures live.
    #[error("payload signature location missing")]
    PayloadSignatureLocation {
        /// Manifest field that was absent.
        field: &'static str,
    },
    /// No payload signature verified against the payload digest.
    #[error("payload signature mismatch")]
    PayloadSignatureMismatch,
}

impl PayloadError {
    /// Pipeline code reported for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidMagic { .. } => ErrorCode::DownloadInvalidMetadataMagicString,
            Self::UnsupportedVersion { .. } => ErrorCode::UnsupportedMajorPayloadVersion,
            Self::MetadataSizeOverflow { .. } => ErrorCode::DownloadInvalidMetadataSize,
            Self::Truncated { region, .. } => match region {
                PayloadRegion::Manifest => ErrorCode::DownloadManifestParseError,
                PayloadRegion::MetadataSignature => ErrorCode::DownloadMetadataSignatureError,
                PayloadRegion::Payload | PayloadRegion::PayloadSignature => {
                    ErrorCode::DownloadPayloadVerificationError
                }
            },
            Self::ManifestDecode { .. } => ErrorCode::DownloadManifestParseError,
            Self::SignatureEncoding { .. } => ErrorCode::DownloadMetadataSignatureError,
            Self::SignatureContainer { region, .. } => match region {
                PayloadRegion::PayloadSignature | PayloadRegion::Payload => {
                    ErrorCode::DownloadPayloadVerificationError
                }
                PayloadRegion::Manifest | PayloadRegion::MetadataSignature => {
                    ErrorCode::DownloadMetadataSignatureError
                }
            },
            Self::MissingMetadataSignature => ErrorCode::DownloadMetadataSignatureMissingError,
            Self::DigestPadding { .. } | Self::PublicKeyRead { .. } | Self::PublicKeyParse { .. } => {
                ErrorCode::DownloadMetadataSignatureVerificationError
            }
            Self::MetadataSignatureMismatch => ErrorCode::DownloadMetadataSignatureMismatch,
            Self::PayloadSignatureLocation { .. } | Self::PayloadSignatureMismatch => {
                ErrorCode::DownloadPayloadVerificationError
            }
        }
    }
}
