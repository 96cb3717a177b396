//! Fixed RSA keys for signing test payloads.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
const ROGUE_KEY_PEM: &str = include_str!("../fixtures/rogue_key.pem");

/// The 2048-bit key test payloads are signed with.
///
/// # Errors
///
/// Returns an error if the bundled PEM cannot be decoded.
pub fn test_signing_key() -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(SIGNING_KEY_PEM).context("failed to decode signing key fixture")
}

/// A second key whose signatures must never verify against the signing key.
///
/// # Errors
///
/// Returns an error if the bundled PEM cannot be decoded.
pub fn rogue_signing_key() -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(ROGUE_KEY_PEM).context("failed to decode rogue key fixture")
}

/// Sign the SHA-256 digest of `data` with PKCS#1 v1.5 padding.
///
/// # Errors
///
/// Returns an error if signing fails.
pub fn sign_digest(key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>> {
    let digest = Sha256::digest(data);
    key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .context("failed to sign digest")
}

/// Write the public half of `key` as an SPKI PEM to `dir/public_key.pem`.
///
/// # Errors
///
/// Returns an error if encoding or writing the key fails.
pub fn write_public_key(dir: &Path, key: &RsaPrivateKey) -> Result<PathBuf> {
    let pem = RsaPublicKey::from(key)
        .to_public_key_pem(LineEnding::LF)
        .context("failed to encode public key")?;
    let path = dir.join("public_key.pem");
    fs::write(&path, pem).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::traits::PublicKeyParts;

    #[test]
    fn fixture_keys_are_distinct_2048_bit_keys() -> Result<()> {
        let signing = test_signing_key()?;
        let rogue = rogue_signing_key()?;
        assert_eq!(signing.size(), 256);
        assert_ne!(signing.n(), rogue.n());
        Ok(())
    }

    #[test]
    fn signature_verifies_with_matching_public_key() -> Result<()> {
        let key = test_signing_key()?;
        let signature = sign_digest(&key, b"metadata")?;
        let digest = Sha256::digest(b"metadata");
        RsaPublicKey::from(&key).verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)?;
        Ok(())
    }
}
