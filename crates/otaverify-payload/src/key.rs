//! Public keys used to check payload signatures.

use std::fs;
use std::path::Path;

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use tracing::debug;

use crate::error::{PayloadError, PayloadResult};
use crate::padding::padded_digest_tail;

/// Public-key operations the signature checks rely on.
pub trait PayloadKey {
    /// Modulus length in bytes; padded digests are sized to it.
    fn size(&self) -> usize;

    /// Apply the raw public-key operation to `signature`, recovering the
    /// padded digest it encodes. `None` when the signature is out of range.
    fn recover_digest(&self, signature: &[u8]) -> Option<Vec<u8>>;

    /// Whether `signature` verifies against `padded_digest`.
    fn verify_padded(&self, signature: &[u8], padded_digest: &[u8]) -> bool;
}

/// RSA public key loaded from PEM.
#[derive(Debug, Clone)]
pub struct RsaPayloadKey {
    key: RsaPublicKey,
}

impl RsaPayloadKey {
    /// Wrap an already-decoded key.
    #[must_use]
    pub const fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Parse an SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM document.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::PublicKeyParse`] if neither encoding decodes.
    pub fn from_pem(pem: &str) -> PayloadResult<Self> {
        Self::parse(pem, None)
    }

    /// Read and parse a PEM key file.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::PublicKeyRead`] if the file cannot be read, or
    /// [`PayloadError::PublicKeyParse`] if it holds no RSA public key.
    pub fn from_pem_file(path: &Path) -> PayloadResult<Self> {
        let pem = fs::read_to_string(path).map_err(|source| PayloadError::PublicKeyRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&pem, Some(path))
    }

    fn parse(pem: &str, path: Option<&Path>) -> PayloadResult<Self> {
        match RsaPublicKey::from_public_key_pem(pem) {
            Ok(key) => Ok(Self { key }),
            Err(spki_error) => RsaPublicKey::from_pkcs1_pem(pem)
                .map(|key| Self { key })
                .map_err(|_| PayloadError::PublicKeyParse {
                    path: path.map(Path::to_path_buf),
                    source: spki_error,
                }),
        }
    }
}

impl PayloadKey for RsaPayloadKey {
    fn size(&self) -> usize {
        self.key.size()
    }

    fn recover_digest(&self, signature: &[u8]) -> Option<Vec<u8>> {
        let size = self.size();
        if signature.len() != size {
            debug!(len = signature.len(), size, "signature length does not match key");
            return None;
        }
        let value = BigUint::from_bytes_be(signature);
        if &value >= self.key.n() {
            return None;
        }
        let recovered = value.modpow(self.key.e(), self.key.n()).to_bytes_be();
        if recovered.len() > size {
            return None;
        }
        let mut padded = vec![0_u8; size - recovered.len()];
        padded.extend_from_slice(&recovered);
        Some(padded)
    }

    fn verify_padded(&self, signature: &[u8], padded_digest: &[u8]) -> bool {
        padded_digest_tail(padded_digest).is_some_and(|tail| {
            self.key
                .verify(Pkcs1v15Sign::new_unprefixed(), tail, signature)
                .is_ok()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::padding::pad_sha256_digest;
    use otaverify_test_support::keys::{sign_digest, test_signing_key, write_public_key};
    use otaverify_test_support::fixtures::{sha256, temp_dir};
    use rsa::pkcs1::{EncodeRsaPublicKey, LineEnding};

    #[test]
    fn recovers_the_padded_digest_from_a_signature() -> anyhow::Result<()> {
        let private = test_signing_key()?;
        let key = RsaPayloadKey::new(RsaPublicKey::from(&private));
        let signature = sign_digest(&private, b"metadata")?;

        let expected = pad_sha256_digest(&sha256(b"metadata"), key.size())?;
        assert_eq!(key.recover_digest(&signature), Some(expected.clone()));
        assert!(key.verify_padded(&signature, &expected));
        assert!(key.recover_digest(&signature[1..]).is_none());
        Ok(())
    }

    #[test]
    fn loads_spki_and_pkcs1_pem() -> anyhow::Result<()> {
        let private = test_signing_key()?;
        let dir = temp_dir()?;
        let spki_path = write_public_key(dir.path(), &private)?;
        let spki = RsaPayloadKey::from_pem_file(&spki_path)?;
        assert_eq!(spki.size(), 256);

        let pkcs1 = RsaPublicKey::from(&private).to_pkcs1_pem(LineEnding::LF)?;
        assert_eq!(RsaPayloadKey::from_pem(&pkcs1)?.size(), 256);
        Ok(())
    }

    #[test]
    fn rejects_missing_and_malformed_keys() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        assert!(matches!(
            RsaPayloadKey::from_pem_file(&dir.path().join("absent.pem")),
            Err(PayloadError::PublicKeyRead { .. })
        ));
        assert!(matches!(
            RsaPayloadKey::from_pem("not a key"),
            Err(PayloadError::PublicKeyParse { path: None, .. })
        ));
        Ok(())
    }
}
