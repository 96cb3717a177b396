//! Payload header parsing.
//!
//! # Design
//! - Two explicit phases: the first 20 bytes decide the version, the version
//!   decides where the manifest starts.
//! - "Need more data" is a value, not an error; callers buffer and retry.
//!
//! Layout, big-endian:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 4 | magic `CrAU` |
//! | 4 | 8 | major version |
//! | 12 | 8 | manifest size |
//! | 20 | 4 | metadata signature size (version 2 only) |
//! | 20 or 24 | manifest size | manifest |

use prost::Message;
use tracing::debug;

use crate::error::{PayloadError, PayloadRegion, PayloadResult};
use crate::manifest::DeltaArchiveManifest;

/// Magic bytes at the start of every payload.
pub const PAYLOAD_MAGIC: [u8; 4] = *b"CrAU";
/// Major version without a metadata signature size field.
pub const LEGACY_MAJOR_VERSION: u64 = 1;
/// Major version carrying a metadata signature size field.
pub const SIGNED_MAJOR_VERSION: u64 = 2;
/// Bytes needed before the header can be inspected at all.
pub const MIN_HEADER_LEN: usize = 20;

const VERSION_OFFSET: usize = 4;
const MANIFEST_SIZE_OFFSET: usize = 12;
const SIGNATURE_SIZE_OFFSET: usize = 20;
const LEGACY_MANIFEST_OFFSET: usize = 20;
const SIGNED_MANIFEST_OFFSET: usize = 24;

/// Outcome of [`PayloadMetadata::parse_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderParse {
    /// The buffer is too short; retry once it holds `required` bytes.
    NeedMoreData {
        /// Minimum buffer length for the next attempt.
        required: usize,
    },
    /// The header was parsed.
    Parsed(PayloadMetadata),
}

/// Fields derived from a payload header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadMetadata {
    major_version: u64,
    manifest_offset: usize,
    manifest_size: u64,
    metadata_signature_size: u32,
    metadata_size: u64,
}

impl PayloadMetadata {
    /// Parse the payload header at the start of `buffer`.
    ///
    /// Accepts `supported_version` and the legacy version 1.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidMagic`], [`PayloadError::UnsupportedVersion`]
    /// or [`PayloadError::MetadataSizeOverflow`]. A short buffer is not an
    /// error; it yields [`HeaderParse::NeedMoreData`].
    pub fn parse_header(buffer: &[u8], supported_version: u64) -> PayloadResult<HeaderParse> {
        if buffer.len() < MIN_HEADER_LEN {
            return Ok(HeaderParse::NeedMoreData {
                required: MIN_HEADER_LEN,
            });
        }

        let found = read_array::<4>(buffer, 0);
        if found != PAYLOAD_MAGIC {
            return Err(PayloadError::InvalidMagic { found });
        }

        let major_version = u64::from_be_bytes(read_array(buffer, VERSION_OFFSET));
        if major_version != supported_version && major_version != LEGACY_MAJOR_VERSION {
            return Err(PayloadError::UnsupportedVersion {
                version: major_version,
                supported: supported_version,
            });
        }

        let manifest_offset = match major_version {
            LEGACY_MAJOR_VERSION => LEGACY_MANIFEST_OFFSET,
            SIGNED_MAJOR_VERSION => SIGNED_MANIFEST_OFFSET,
            version => {
                return Err(PayloadError::UnsupportedVersion {
                    version,
                    supported: supported_version,
                });
            }
        };
        if buffer.len() < manifest_offset {
            return Ok(HeaderParse::NeedMoreData {
                required: manifest_offset,
            });
        }

        let manifest_size = u64::from_be_bytes(read_array(buffer, MANIFEST_SIZE_OFFSET));
        let metadata_signature_size = if major_version == SIGNED_MAJOR_VERSION {
            u32::from_be_bytes(read_array(buffer, SIGNATURE_SIZE_OFFSET))
        } else {
            0
        };
        let metadata_size = u64::try_from(manifest_offset)
            .ok()
            .and_then(|offset| offset.checked_add(manifest_size))
            .filter(|size| usize::try_from(*size).is_ok())
            .ok_or(PayloadError::MetadataSizeOverflow { manifest_size })?;

        debug!(
            major_version,
            manifest_size, metadata_signature_size, metadata_size, "payload header parsed"
        );
        Ok(HeaderParse::Parsed(Self {
            major_version,
            manifest_offset,
            manifest_size,
            metadata_signature_size,
            metadata_size,
        }))
    }

    /// Major payload version.
    #[must_use]
    pub const fn major_version(&self) -> u64 {
        self.major_version
    }

    /// Offset of the manifest: 20 for version 1, 24 for version 2.
    #[must_use]
    pub const fn manifest_offset(&self) -> usize {
        self.manifest_offset
    }

    /// Manifest length in bytes.
    #[must_use]
    pub const fn manifest_size(&self) -> u64 {
        self.manifest_size
    }

    /// Metadata signature length declared by version-2 headers; zero otherwise.
    #[must_use]
    pub const fn metadata_signature_size(&self) -> u32 {
        self.metadata_signature_size
    }

    /// Header plus manifest length.
    #[must_use]
    pub const fn metadata_size(&self) -> u64 {
        self.metadata_size
    }

    /// Raw manifest bytes inside `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Truncated`] if `buffer` ends before the manifest does.
    pub fn manifest_bytes<'a>(&self, buffer: &'a [u8]) -> PayloadResult<&'a [u8]> {
        let end = region_end(buffer, self.metadata_size, PayloadRegion::Manifest)?;
        Ok(&buffer[self.manifest_offset..end])
    }

    /// Decode the manifest inside `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Truncated`] if the manifest is incomplete, or
    /// [`PayloadError::ManifestDecode`] if it is not a valid manifest.
    pub fn get_manifest(&self, buffer: &[u8]) -> PayloadResult<DeltaArchiveManifest> {
        let bytes = self.manifest_bytes(buffer)?;
        DeltaArchiveManifest::decode(bytes).map_err(|source| PayloadError::ManifestDecode { source })
    }
}

/// End offset of a region ending at `required`, if `buffer` covers it.
pub(crate) fn region_end(
    buffer: &[u8],
    required: u64,
    region: PayloadRegion,
) -> PayloadResult<usize> {
    usize::try_from(required)
        .ok()
        .filter(|end| *end <= buffer.len())
        .ok_or(PayloadError::Truncated {
            region,
            required,
            available: buffer.len(),
        })
}

fn read_array<const N: usize>(buffer: &[u8], offset: usize) -> [u8; N] {
    let mut bytes = [0_u8; N];
    bytes.copy_from_slice(&buffer[offset..offset + N]);
    bytes
}
