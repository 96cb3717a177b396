//! Metadata and payload signature checks.
//!
//! # Design
//! - The metadata digest covers exactly `[0, metadata_size)`; signature bytes
//!   are never part of what they sign.
//! - An out-of-band signature is checked by recovering the padded digest with
//!   the public key and comparing bytes. An in-payload signature container is
//!   checked by direct verification; any candidate verifying is enough.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use prost::Message;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{PayloadError, PayloadRegion, PayloadResult};
use crate::key::{PayloadKey, RsaPayloadKey};
use crate::manifest::{DeltaArchiveManifest, Signatures};
use crate::metadata::{PayloadMetadata, SIGNED_MAJOR_VERSION, region_end};
use crate::padding::pad_sha256_digest;

enum SignatureSource<'a> {
    OutOfBand(Vec<u8>),
    InPayload(&'a [u8]),
}

impl PayloadMetadata {
    /// Check the metadata signature of `buffer` under `key`.
    ///
    /// A non-empty `out_of_band_signature` (base64) takes precedence over the
    /// signature container a version-2 payload carries after its manifest.
    ///
    /// # Errors
    ///
    /// - [`PayloadError::Truncated`] if the buffer does not cover the metadata and its signature.
    /// - [`PayloadError::SignatureEncoding`] for malformed base64.
    /// - [`PayloadError::MissingMetadataSignature`] when no source supplies a signature.
    /// - [`PayloadError::DigestPadding`] when the digest cannot be padded for the key.
    /// - [`PayloadError::MetadataSignatureMismatch`] when no signature verifies.
    pub fn validate_metadata_signature(
        &self,
        buffer: &[u8],
        out_of_band_signature: &str,
        key: &dyn PayloadKey,
    ) -> PayloadResult<()> {
        let signature_end = self
            .metadata_size()
            .checked_add(u64::from(self.metadata_signature_size()))
            .unwrap_or(u64::MAX);
        let signature_end = region_end(buffer, signature_end, PayloadRegion::MetadataSignature)?;
        let metadata_end = region_end(
            buffer,
            self.metadata_size(),
            PayloadRegion::MetadataSignature,
        )?;

        let source = if out_of_band_signature.is_empty() {
            if self.major_version() == SIGNED_MAJOR_VERSION && signature_end > metadata_end {
                SignatureSource::InPayload(&buffer[metadata_end..signature_end])
            } else {
                return Err(PayloadError::MissingMetadataSignature);
            }
        } else {
            let decoded = STANDARD
                .decode(out_of_band_signature.trim())
                .map_err(|source| PayloadError::SignatureEncoding { source })?;
            if decoded.is_empty() {
                return Err(PayloadError::MissingMetadataSignature);
            }
            SignatureSource::OutOfBand(decoded)
        };

        let digest = Sha256::digest(&buffer[..metadata_end]);
        let padded = pad_sha256_digest(&digest, key.size())?;

        match source {
            SignatureSource::OutOfBand(signature) => match key.recover_digest(&signature) {
                Some(recovered) if recovered == padded => {}
                recovered => {
                    warn!(
                        expected = %hex::encode(&padded),
                        recovered = %recovered.map(hex::encode).unwrap_or_default(),
                        "out-of-band metadata signature mismatch"
                    );
                    return Err(PayloadError::MetadataSignatureMismatch);
                }
            },
            SignatureSource::InPayload(container) => {
                let signatures = Signatures::decode(container).map_err(|source| {
                    PayloadError::SignatureContainer {
                        region: PayloadRegion::MetadataSignature,
                        source,
                    }
                })?;
                if !any_signature_verifies(&signatures, &padded, key) {
                    warn!(
                        candidates = signatures.signatures.len(),
                        digest = %hex::encode(digest),
                        "no in-payload metadata signature verified"
                    );
                    return Err(PayloadError::MetadataSignatureMismatch);
                }
            }
        }

        debug!(metadata_size = self.metadata_size(), "metadata signature verified");
        Ok(())
    }

    /// Check the metadata signature with an RSA key read from `public_key_path`.
    ///
    /// # Errors
    ///
    /// Returns key loading errors, then anything
    /// [`validate_metadata_signature`](Self::validate_metadata_signature) returns.
    pub fn validate_metadata_signature_with_key_file(
        &self,
        buffer: &[u8],
        out_of_band_signature: &str,
        public_key_path: &Path,
    ) -> PayloadResult<()> {
        let key = RsaPayloadKey::from_pem_file(public_key_path)?;
        self.validate_metadata_signature(buffer, out_of_band_signature, &key)
    }

    /// Check the whole-payload signature stored at the manifest's signature offset.
    ///
    /// The digest covers everything from the start of `payload` up to the
    /// signature blob, which sits `signatures_offset` bytes past the metadata
    /// signature.
    ///
    /// # Errors
    ///
    /// - [`PayloadError::PayloadSignatureLocation`] if the manifest lacks the offsets.
    /// - [`PayloadError::Truncated`] if `payload` ends before the signature blob does.
    /// - [`PayloadError::SignatureContainer`] if the blob does not decode.
    /// - [`PayloadError::PayloadSignatureMismatch`] if no signature verifies.
    pub fn verify_payload_signature(
        &self,
        payload: &[u8],
        manifest: &DeltaArchiveManifest,
        key: &dyn PayloadKey,
    ) -> PayloadResult<()> {
        let offset = manifest
            .signatures_offset
            .ok_or(PayloadError::PayloadSignatureLocation {
                field: "signatures_offset",
            })?;
        let size = manifest
            .signatures_size
            .ok_or(PayloadError::PayloadSignatureLocation {
                field: "signatures_size",
            })?;

        let signed_end = self
            .metadata_size()
            .checked_add(u64::from(self.metadata_signature_size()))
            .and_then(|start| start.checked_add(offset))
            .unwrap_or(u64::MAX);
        let blob_end = signed_end.checked_add(size).unwrap_or(u64::MAX);
        let signed_end = region_end(payload, signed_end, PayloadRegion::Payload)?;
        let blob_end = region_end(payload, blob_end, PayloadRegion::PayloadSignature)?;

        let digest = Sha256::digest(&payload[..signed_end]);
        let padded = pad_sha256_digest(&digest, key.size())?;
        let signatures = Signatures::decode(&payload[signed_end..blob_end]).map_err(|source| {
            PayloadError::SignatureContainer {
                region: PayloadRegion::PayloadSignature,
                source,
            }
        })?;

        if any_signature_verifies(&signatures, &padded, key) {
            debug!(signed_len = signed_end, "payload signature verified");
            Ok(())
        } else {
            warn!(
                candidates = signatures.signatures.len(),
                digest = %hex::encode(digest),
                "no payload signature verified"
            );
            Err(PayloadError::PayloadSignatureMismatch)
        }
    }
}

fn any_signature_verifies(signatures: &Signatures, padded: &[u8], key: &dyn PayloadKey) -> bool {
    signatures
        .signatures
        .iter()
        .any(|signature| key.verify_padded(signature.signature_bytes(), padded))
}
