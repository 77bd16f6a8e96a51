//! Hash and key-derivation helpers.
//!
//! HKDF-SHA256 is the workhorse for every sub-key in the engine. HMAC-SHA512
//! is only used by the master-key expansion chain.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

/// Errors that can occur while deriving key material.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum KdfError {
    #[error("HKDF output length {0} is invalid")]
    InvalidLength(usize),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

/// HKDF extract-then-expand over SHA-256.
///
/// An empty `salt` is treated as the RFC 5869 default (a zero-filled block).
pub fn hkdf_expand(ikm: &[u8], salt: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>, KdfError> {
    let salt = if salt.is_empty() { None } else { Some(salt) };
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = vec![0u8; length];
    hk.expand(info, &mut okm)
        .map_err(|_| KdfError::InvalidLength(length))?;
    Ok(okm)
}

/// HKDF with a fixed 32-byte output.
pub fn hkdf_32(ikm: &[u8], salt: &[u8], info: &[u8]) -> [u8; 32] {
    let salt = if salt.is_empty() { None } else { Some(salt) };
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .expect("32 bytes is valid output length");
    okm
}

/// SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// HMAC-SHA512 of `data` under `key`.
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    let mut mac = HmacSha512::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hkdf_rfc5869_case_1() {
        let ikm = [0x0bu8; 22];
        let salt: Vec<u8> = (0x00..=0x0c).collect();
        let info: Vec<u8> = (0xf0..=0xf9).collect();

        let okm = hkdf_expand(&ikm, &salt, &info, 42).unwrap();
        assert_eq!(
            hex::encode(okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    #[test]
    fn test_hkdf_32_matches_variable() {
        let a = hkdf_32(b"ikm", b"salt", b"info");
        let b = hkdf_expand(b"ikm", b"salt", b"info", 32).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_hkdf_domain_separation() {
        assert_ne!(hkdf_32(b"ikm", b"salt", b"a"), hkdf_32(b"ikm", b"salt", b"b"));
        assert_ne!(hkdf_32(b"ikm", b"s1", b"a"), hkdf_32(b"ikm", b"s2", b"a"));
    }

    #[test]
    fn test_hkdf_rejects_oversized_output() {
        assert_eq!(
            hkdf_expand(b"ikm", b"", b"", 255 * 32 + 1),
            Err(KdfError::InvalidLength(255 * 32 + 1))
        );
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hmac_sha512_len_and_determinism() {
        let a = hmac_sha512(b"key", b"data");
        let b = hmac_sha512(b"key", b"data");
        assert_eq!(a, b);
        assert_ne!(a, hmac_sha512(b"key2", b"data"));
    }
}
