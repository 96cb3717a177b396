use anyhow::{Result, bail};
use otaverify_action::ErrorCode;
use otaverify_payload::{
    DeltaArchiveManifest, HeaderParse, PayloadError, PayloadMetadata, RsaPayloadKey, Signatures,
};
use otaverify_test_support::fixtures::image_bytes;
use otaverify_test_support::keys::{rogue_signing_key, sign_digest, test_signing_key};
use otaverify_test_support::payload::PayloadBuilder;
use prost::Message;
use rsa::{RsaPrivateKey, RsaPublicKey};

const SIGNATURE_LEN: usize = 256;

/// Full payload: metadata, empty metadata signature, data blobs, payload signature.
fn full_payload(signer: &RsaPrivateKey, data: &[u8]) -> Result<(Vec<u8>, DeltaArchiveManifest)> {
    let container_len = Signatures::from_blobs([vec![0_u8; SIGNATURE_LEN]]).encoded_len();
    let manifest = DeltaArchiveManifest {
        signatures_offset: Some(u64::try_from(data.len())?),
        signatures_size: Some(u64::try_from(container_len)?),
        ..DeltaArchiveManifest::default()
    };
    let mut payload = PayloadBuilder::new(2, manifest.encode_to_vec()).metadata();
    payload.extend_from_slice(data);

    let signature = sign_digest(signer, &payload)?;
    let container = Signatures::from_blobs([signature]).encode_to_vec();
    if container.len() != container_len {
        bail!("signature container size changed");
    }
    payload.extend_from_slice(&container);
    Ok((payload, manifest))
}

fn parse(buffer: &[u8]) -> Result<PayloadMetadata> {
    match PayloadMetadata::parse_header(buffer, 2)? {
        HeaderParse::Parsed(metadata) => Ok(metadata),
        HeaderParse::NeedMoreData { required } => bail!("header needs {required} bytes"),
    }
}

#[test]
fn payload_signature_covers_data_blobs() -> Result<()> {
    let signer = test_signing_key()?;
    let key = RsaPayloadKey::new(RsaPublicKey::from(&signer));
    let (payload, manifest) = full_payload(&signer, &image_bytes(10_000, 3))?;
    let metadata = parse(&payload)?;

    metadata.verify_payload_signature(&payload, &manifest, &key)?;

    let mut tampered = payload.clone();
    let data_byte = usize::try_from(metadata.metadata_size())? + 5_000;
    tampered[data_byte] ^= 0x10;
    let error = metadata
        .verify_payload_signature(&tampered, &manifest, &key)
        .err();
    assert!(matches!(error, Some(PayloadError::PayloadSignatureMismatch)));
    assert_eq!(
        error.map(|error| error.code()),
        Some(ErrorCode::DownloadPayloadVerificationError)
    );
    Ok(())
}

#[test]
fn payload_signed_by_another_key_is_rejected() -> Result<()> {
    let (payload, manifest) = full_payload(&rogue_signing_key()?, &image_bytes(512, 1))?;
    let key = RsaPayloadKey::new(RsaPublicKey::from(&test_signing_key()?));
    assert!(matches!(
        parse(&payload)?.verify_payload_signature(&payload, &manifest, &key),
        Err(PayloadError::PayloadSignatureMismatch)
    ));
    Ok(())
}

#[test]
fn missing_signature_location_or_bytes_fail() -> Result<()> {
    let signer = test_signing_key()?;
    let key = RsaPayloadKey::new(RsaPublicKey::from(&signer));
    let (payload, manifest) = full_payload(&signer, &image_bytes(512, 9))?;
    let metadata = parse(&payload)?;

    let without_offset = DeltaArchiveManifest {
        signatures_offset: None,
        ..manifest.clone()
    };
    assert!(matches!(
        metadata.verify_payload_signature(&payload, &without_offset, &key),
        Err(PayloadError::PayloadSignatureLocation {
            field: "signatures_offset"
        })
    ));

    let truncated = &payload[..payload.len() - 10];
    let error = metadata
        .verify_payload_signature(truncated, &manifest, &key)
        .err();
    assert_eq!(
        error.map(|error| error.code()),
        Some(ErrorCode::DownloadPayloadVerificationError)
    );
    Ok(())
}
