//! PKCS#1 v1.5 padding of SHA-256 digests.

use crate::error::{PayloadError, PayloadResult};

/// DER `DigestInfo` prefix identifying SHA-256.
pub const SHA256_DIGEST_INFO: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, 0x05,
    0x00, 0x04, 0x20,
];

/// SHA-256 digest length in bytes.
pub const SHA256_LEN: usize = 32;

// 00 01, at least eight FF bytes, 00
const MIN_PADDING: usize = 11;

/// Pad `hash` to `key_size` bytes as `00 01 FF.. 00 || DigestInfo || hash`.
///
/// # Errors
///
/// Returns [`PayloadError::DigestPadding`] when the hash is not a SHA-256
/// digest or the key is too small to hold the padded value.
pub fn pad_sha256_digest(hash: &[u8], key_size: usize) -> PayloadResult<Vec<u8>> {
    if hash.len() != SHA256_LEN {
        return Err(PayloadError::DigestPadding {
            reason: "digest is not sha-256",
            key_size,
        });
    }
    let tail_len = SHA256_DIGEST_INFO.len() + SHA256_LEN;
    if key_size < tail_len + MIN_PADDING {
        return Err(PayloadError::DigestPadding {
            reason: "key too small for padded digest",
            key_size,
        });
    }

    let mut padded = Vec::with_capacity(key_size);
    padded.extend_from_slice(&[0x00, 0x01]);
    padded.resize(key_size - tail_len - 1, 0xFF);
    padded.push(0x00);
    padded.extend_from_slice(&SHA256_DIGEST_INFO);
    padded.extend_from_slice(hash);
    Ok(padded)
}

/// The `DigestInfo || hash` tail of a padded digest, if the padding is well formed.
#[must_use]
pub fn padded_digest_tail(padded: &[u8]) -> Option<&[u8]> {
    let rest = padded.strip_prefix(&[0x00, 0x01])?;
    let separator = rest.iter().position(|byte| *byte != 0xFF)?;
    if separator < MIN_PADDING - 3 || rest[separator] != 0x00 {
        return None;
    }
    Some(&rest[separator + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_fills_the_key_size() -> PayloadResult<()> {
        let hash = [0x5A; SHA256_LEN];
        let padded = pad_sha256_digest(&hash, 256)?;

        assert_eq!(padded.len(), 256);
        assert_eq!(&padded[..2], &[0x00, 0x01]);
        assert!(padded[2..256 - 52].iter().all(|byte| *byte == 0xFF));
        assert_eq!(padded[256 - 52], 0x00);
        assert_eq!(&padded[256 - 51..256 - 32], &SHA256_DIGEST_INFO);
        assert_eq!(&padded[256 - 32..], &hash);

        let tail = padded_digest_tail(&padded).unwrap_or_default();
        assert_eq!(tail.len(), SHA256_DIGEST_INFO.len() + SHA256_LEN);
        Ok(())
    }

    #[test]
    fn padding_rejects_bad_inputs() {
        assert!(matches!(
            pad_sha256_digest(&[0; 20], 256),
            Err(PayloadError::DigestPadding { .. })
        ));
        assert!(matches!(
            pad_sha256_digest(&[0; SHA256_LEN], 40),
            Err(PayloadError::DigestPadding { .. })
        ));
    }

    #[test]
    fn malformed_padding_has_no_tail() {
        assert!(padded_digest_tail(&[0x00, 0x02, 0xFF]).is_none());
        assert!(padded_digest_tail(&[0x00, 0x01, 0xFF, 0xFF, 0x00, 0x01]).is_none());
    }
}
