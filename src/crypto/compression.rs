//! DEFLATE compression for file payloads.
//!
//! Compression is opportunistic: the payload codec only keeps the deflated
//! form when it is strictly smaller than the input, and records that choice
//! in the file metadata rather than in a marker byte.

use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use std::io::Read;
use thiserror::Error;

/// Upper bound on inflated output. Guards against deflate bombs in crafted payloads.
pub const MAX_DECOMPRESSED_SIZE: u64 = 512 * 1024 * 1024;

/// Compression errors.
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Decompressed data exceeds {0} bytes")]
    TooLarge(u64),
}

/// Compresses data using the DEFLATE algorithm.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut encoder = DeflateEncoder::new(data, Compression::best());
    let mut compressed = Vec::new();

    encoder
        .read_to_end(&mut compressed)
        .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;

    Ok(compressed)
}

/// Compresses `data` and returns the result only if it saves space.
pub fn compress_if_smaller(data: &[u8]) -> Result<Option<Vec<u8>>, CompressionError> {
    if data.is_empty() {
        return Ok(None);
    }
    let compressed = compress(data)?;
    if compressed.len() < data.len() {
        Ok(Some(compressed))
    } else {
        Ok(None)
    }
}

/// Decompresses raw DEFLATE data.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let decoder = DeflateDecoder::new(data);
    let mut limited = decoder.take(MAX_DECOMPRESSED_SIZE + 1);
    let mut decompressed = Vec::new();

    limited
        .read_to_end(&mut decompressed)
        .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;

    if decompressed.len() as u64 > MAX_DECOMPRESSED_SIZE {
        return Err(CompressionError::TooLarge(MAX_DECOMPRESSED_SIZE));
    }

    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress_roundtrip() {
        let data = b"Hello, this is a test message that should compress well. \
                     Hello, this is a test message that should compress well. \
                     Hello, this is a test message that should compress well.";

        let compressed = compress(data).unwrap();
        let decompressed = decompress(&compressed).unwrap();

        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_compress_if_smaller_keeps_repetitive_data() {
        let data = "A".repeat(640).into_bytes();

        let compressed = compress_if_smaller(&data).unwrap().unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_compress_if_smaller_skips_random_data() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let data: Vec<u8> = (0..100).map(|_| rng.gen()).collect();

        assert!(compress_if_smaller(&data).unwrap().is_none());
    }

    #[test]
    fn test_compress_if_smaller_empty() {
        assert!(compress_if_smaller(b"").unwrap().is_none());
    }

    #[test]
    fn test_decompress_garbage_fails() {
        let data = vec![0xFFu8, 0xFF, 0xFF, 0xFF, 0x00, 0x13];
        assert!(decompress(&data).is_err());
    }
}
