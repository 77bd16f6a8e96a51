//! Authenticated encryption for Chimera.
//!
//! Every ciphertext layer in the engine is ChaCha20-Poly1305 under a raw
//! 32-byte key. The wire layout is fixed:
//!
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Nonce size for ChaCha20Poly1305.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size.
pub const TAG_SIZE: usize = 16;

/// Smallest valid sealed message: nonce + tag around an empty plaintext.
pub const MIN_SEALED_LEN: usize = NONCE_SIZE + TAG_SIZE;

/// Errors that can occur during authenticated encryption.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SymmetricError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Tag mismatch: wrong key, corrupted or tampered data.
    #[error("Authentication failed: wrong key or tampered data")]
    AuthenticationFailure,

    #[error("Invalid ciphertext: too short")]
    CiphertextTooShort,
}

/// Encrypts `plaintext` under `key`, optionally binding `aad`.
///
/// The output format is: nonce (12 bytes) || ciphertext || tag (16 bytes)
pub fn aead_encrypt(
    key: &[u8; 32],
    plaintext: &[u8],
    aad: Option<&[u8]>,
) -> Result<Vec<u8>, SymmetricError> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| SymmetricError::EncryptionFailed(e.to_string()))?;

    let payload = Payload {
        msg: plaintext,
        aad: aad.unwrap_or_default(),
    };
    let ciphertext = cipher
        .encrypt(nonce, payload)
        .map_err(|e| SymmetricError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypts data produced by [`aead_encrypt`].
///
/// Never returns partial plaintext: any tag mismatch yields
/// [`SymmetricError::AuthenticationFailure`].
pub fn aead_decrypt(
    key: &[u8; 32],
    data: &[u8],
    aad: Option<&[u8]>,
) -> Result<Vec<u8>, SymmetricError> {
    if data.len() < MIN_SEALED_LEN {
        return Err(SymmetricError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| SymmetricError::AuthenticationFailure)?;

    let payload = Payload {
        msg: ciphertext,
        aad: aad.unwrap_or_default(),
    };
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), payload)
        .map_err(|_| SymmetricError::AuthenticationFailure)
}
