//! Keyed byte permutation of a sealed blob.
//!
//! The permutation is rebuilt from the key at decode time, so it adds no
//! bytes to the payload.

use super::kdf::KdfError;
use super::prng::{invert_permutation, CryptoPrng};

/// PRNG salt for the block permutation.
const PERMUTATION_SALT: &[u8] = b"block-permutation-key-salt:";

/// Scatters the bytes of `data` with a permutation keyed by `key`.
pub fn apply_block_permutation(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, KdfError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let forward = CryptoPrng::from_key(key, PERMUTATION_SALT)?.permutation(data.len());

    let mut permuted = vec![0u8; data.len()];
    for (i, &byte) in data.iter().enumerate() {
        permuted[forward[i]] = byte;
    }
    Ok(permuted)
}

/// Inverse of [`apply_block_permutation`].
pub fn reverse_block_permutation(permuted: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, KdfError> {
    if permuted.is_empty() {
        return Ok(Vec::new());
    }
    let forward = CryptoPrng::from_key(key, PERMUTATION_SALT)?.permutation(permuted.len());
    let inverse = invert_permutation(&forward);

    let mut original = vec![0u8; permuted.len()];
    for (i, &byte) in permuted.iter().enumerate() {
        original[inverse[i]] = byte;
    }
    Ok(original)
}
