//! Protobuf model of the delta archive manifest and signature containers.
//!
//! Only the fields the verifier reads are modelled; unknown fields are skipped
//! by the decoder, so manifests produced with the full schema decode cleanly.

/// Size and digest of one partition image.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct PartitionInfo {
    /// Image size in bytes.
    #[prost(uint64, optional, tag = "1")]
    pub size: Option<u64>,
    /// SHA-256 digest of the image.
    #[prost(bytes = "vec", optional, tag = "2")]
    pub hash: Option<Vec<u8>>,
}

/// Per-partition section of the manifest.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct PartitionUpdate {
    /// Partition name, such as `system` or `boot`.
    #[prost(string, optional, tag = "1")]
    pub partition_name: Option<String>,
    /// Expected image before the update; absent for full payloads.
    #[prost(message, optional, tag = "6")]
    pub old_partition_info: Option<PartitionInfo>,
    /// Expected image after the update.
    #[prost(message, optional, tag = "7")]
    pub new_partition_info: Option<PartitionInfo>,
}

/// Manifest describing every partition the payload updates.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct DeltaArchiveManifest {
    /// Block size used by install operations.
    #[prost(uint32, optional, tag = "3")]
    pub block_size: Option<u32>,
    /// Offset of the payload signature blob, relative to the data section.
    #[prost(uint64, optional, tag = "4")]
    pub signatures_offset: Option<u64>,
    /// Size of the payload signature blob.
    #[prost(uint64, optional, tag = "5")]
    pub signatures_size: Option<u64>,
    /// Minor payload version; zero marks a full payload.
    #[prost(uint32, optional, tag = "12")]
    pub minor_version: Option<u32>,
    /// Partitions in install order.
    #[prost(message, repeated, tag = "13")]
    pub partitions: Vec<PartitionUpdate>,
    /// Newest build timestamp the payload may be applied over.
    #[prost(int64, optional, tag = "14")]
    pub max_timestamp: Option<i64>,
}

/// One signature inside a [`Signatures`] container.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Signature {
    /// Legacy key version marker.
    #[prost(uint32, optional, tag = "1")]
    pub version: Option<u32>,
    /// Raw signature bytes, possibly zero-padded to a fixed size.
    #[prost(bytes = "vec", optional, tag = "2")]
    pub data: Option<Vec<u8>>,
    /// Length of `data` before zero padding.
    #[prost(fixed32, optional, tag = "3")]
    pub unpadded_signature_size: Option<u32>,
}

impl Signature {
    /// Signature bytes with any trailing zero padding removed.
    #[must_use]
    pub fn signature_bytes(&self) -> &[u8] {
        let data = self.data.as_deref().unwrap_or_default();
        match self
            .unpadded_signature_size
            .and_then(|size| usize::try_from(size).ok())
        {
            Some(size) if size <= data.len() => &data[..size],
            _ => data,
        }
    }
}

/// Container of candidate signatures, one per signing key.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Signatures {
    /// Candidate signatures; any one verifying is sufficient.
    #[prost(message, repeated, tag = "1")]
    pub signatures: Vec<Signature>,
}

impl Signatures {
    /// Wrap raw signature blobs, one candidate each.
    #[must_use]
    pub fn from_blobs<I>(blobs: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self {
            signatures: blobs
                .into_iter()
                .map(|data| Signature {
                    version: None,
                    unpadded_signature_size: u32::try_from(data.len()).ok(),
                    data: Some(data),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn manifest_survives_encoding() -> Result<(), prost::DecodeError> {
        let manifest = DeltaArchiveManifest {
            block_size: Some(4096),
            minor_version: Some(0),
            partitions: vec![PartitionUpdate {
                partition_name: Some("system".into()),
                old_partition_info: None,
                new_partition_info: Some(PartitionInfo {
                    size: Some(8192),
                    hash: Some(vec![0xAB; 32]),
                }),
            }],
            ..DeltaArchiveManifest::default()
        };
        let decoded = DeltaArchiveManifest::decode(manifest.encode_to_vec().as_slice())?;
        assert_eq!(decoded, manifest);
        assert_eq!(decoded.partitions[0].partition_name(), "system");
        Ok(())
    }

    #[test]
    fn padded_signature_is_trimmed() {
        let signature = Signature {
            version: None,
            data: Some(vec![1, 2, 3, 0, 0]),
            unpadded_signature_size: Some(3),
        };
        assert_eq!(signature.signature_bytes(), &[1, 2, 3]);

        let oversized = Signature {
            unpadded_signature_size: Some(99),
            ..signature
        };
        assert_eq!(oversized.signature_bytes().len(), 5);
    }
}
