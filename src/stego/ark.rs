//! Acoustic Resonance Keying (ARK).
//!
//! The payload key is derived from the Alpha key and a statistical
//! fingerprint of the carrier file. Opening requires the bit-exact original
//! carrier as well as the key: any re-encode of the carrier changes the
//! fingerprint and the payload is gone for good.

use tracing::debug;
use thiserror::Error;

use super::image::{ImageStego, ImageStegoError};
use crate::crypto::{aead_decrypt, aead_encrypt, hkdf_32, sha256, SymmetricError};
use crate::keys::SecretKey;
use crate::payload::{prepare, unpack, DecodedFile, PayloadError};

/// HKDF info for the carrier-bound key.
const ARK_INFO: &[u8] = b"chimera-ark-v1";

/// Fingerprint length: SHA-256 plus three f64 statistics.
pub const FINGERPRINT_LEN: usize = 32 + 3 * 8;

/// Errors from carrier-bound sealing.
#[derive(Error, Debug)]
pub enum ArkError {
    #[error("Image error: {0}")]
    Image(#[from] ImageStegoError),

    #[error("No payload found in image")]
    NoPayload,

    #[error("Encryption error: {0}")]
    Symmetric(#[from] SymmetricError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),
}

/// `SHA-256(bytes) ‖ mean ‖ stddev ‖ entropy`, statistics as big-endian f64.
pub fn fingerprint(carrier: &[u8]) -> [u8; FINGERPRINT_LEN] {
    let mut histogram = [0u64; 256];
    let mut sum = 0f64;
    for &byte in carrier {
        histogram[usize::from(byte)] += 1;
        sum += f64::from(byte);
    }

    let n = carrier.len() as f64;
    let (mean, stddev, entropy) = if carrier.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let mean = sum / n;
        let variance = histogram
            .iter()
            .enumerate()
            .map(|(value, &count)| count as f64 * (value as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        let entropy = histogram
            .iter()
            .filter(|&&count| count > 0)
            .map(|&count| {
                let p = count as f64 / n;
                -p * p.log2()
            })
            .sum::<f64>();
        (mean, variance.sqrt(), entropy)
    };

    let mut out = [0u8; FINGERPRINT_LEN];
    out[..32].copy_from_slice(&sha256(carrier));
    out[32..40].copy_from_slice(&mean.to_be_bytes());
    out[40..48].copy_from_slice(&stddev.to_be_bytes());
    out[48..56].copy_from_slice(&entropy.to_be_bytes());
    out
}

/// Derives the carrier-bound key.
pub fn ark_key(alpha: &SecretKey, fingerprint: &[u8]) -> SecretKey {
    SecretKey::from_bytes(hkdf_32(alpha.as_bytes(), fingerprint, ARK_INFO))
}

/// Encrypts a file under the carrier-bound key and disperses it into the
/// carrier's pixels. Returns the stego image as PNG.
pub fn seal(
    carrier: &[u8],
    data: &[u8],
    name: &str,
    mime_type: &str,
    alpha: &SecretKey,
    compress: bool,
) -> Result<Vec<u8>, ArkError> {
    let key = ark_key(alpha, &fingerprint(carrier));
    let prepared = prepare(data, name, mime_type, compress)?;
    let sealed = aead_encrypt(key.as_bytes(), &prepared, None)?;

    let stego = ImageStego::from_bytes(carrier)?;
    let image = ImageStego::from_image(stego.embed(&sealed, alpha.as_bytes())?);

    debug!(carrier = carrier.len(), sealed = sealed.len(), "sealed carrier-bound payload");
    Ok(image.to_png_bytes()?)
}

/// Recovers a file sealed with [`seal`].
///
/// `original_carrier` must be the exact bytes passed to `seal`.
pub fn open(original_carrier: &[u8], stego_image: &[u8], alpha: &SecretKey) -> Result<DecodedFile, ArkError> {
    let key = ark_key(alpha, &fingerprint(original_carrier));
    let sealed = ImageStego::from_bytes(stego_image)?
        .extract(alpha.as_bytes())
        .ok_or(ArkError::NoPayload)?;
    let prepared = aead_decrypt(key.as_bytes(), &sealed, None)?;
    Ok(unpack(&prepared)?)
}
