//! Builder for raw update payload bytes.
//!
//! The builder lays out `magic || version || manifest_size || [signature_size]
//! || manifest || signature` exactly as payload producers do, so tests can
//! sign the metadata region before appending the signature.

/// Magic bytes every payload starts with.
pub const PAYLOAD_MAGIC: [u8; 4] = *b"CrAU";

/// Assembles payload bytes for a given major version.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    magic: [u8; 4],
    major_version: u64,
    manifest: Vec<u8>,
    signature_size: u32,
}

impl PayloadBuilder {
    /// Start a payload with `manifest` as the serialized manifest body.
    #[must_use]
    pub fn new(major_version: u64, manifest: impl Into<Vec<u8>>) -> Self {
        Self {
            magic: PAYLOAD_MAGIC,
            major_version,
            manifest: manifest.into(),
            signature_size: 0,
        }
    }

    /// Override the magic bytes.
    #[must_use]
    pub const fn magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = magic;
        self
    }

    /// Declare the metadata signature size written into version-2 headers.
    #[must_use]
    pub const fn signature_size(mut self, size: u32) -> Self {
        self.signature_size = size;
        self
    }

    /// Header plus manifest: the region a metadata signature covers.
    #[must_use]
    pub fn metadata(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(24 + self.manifest.len());
        bytes.extend_from_slice(&self.magic);
        bytes.extend_from_slice(&self.major_version.to_be_bytes());
        let manifest_len = u64::try_from(self.manifest.len()).unwrap_or(u64::MAX);
        bytes.extend_from_slice(&manifest_len.to_be_bytes());
        if self.major_version == 2 {
            bytes.extend_from_slice(&self.signature_size.to_be_bytes());
        }
        bytes.extend_from_slice(&self.manifest);
        bytes
    }

    /// Metadata followed by `signature`.
    #[must_use]
    pub fn build(&self, signature: &[u8]) -> Vec<u8> {
        let mut bytes = self.metadata();
        bytes.extend_from_slice(signature);
        bytes
    }
}
