//! Payload framing, independent of encryption.
//!
//! - [`prepared`]: file metadata + file bytes, optionally deflated
//! - [`unified`]: the transmitted bundle of veil seed and blobs
//! - [`armor`]: the armored PNG file transport

pub mod armor;
pub mod prepared;
pub mod unified;

pub use armor::{armor, dearmor, ARMOR_MARKER};
pub use prepared::{parse, prepare, unpack, DecodedFile, FileMetadata};
pub use unified::{UnifiedPayload, MAGIC_BINARY};

use thiserror::Error;

use crate::crypto::CompressionError;

/// Structural errors in payload framing.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// Length or structure violation. Surfaced verbatim.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
