//! Prepared payload: file metadata and file bytes in one framed buffer.
//!
//! Layout: `[u16 BE metadata length][metadata JSON][file bytes]`
//!
//! The metadata JSON uses short keys: `{"f": name, "t": mime type, "c": 0|1}`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PayloadError;
use crate::crypto::{compress_if_smaller, decompress};

/// Descriptive data carried inside the encrypted region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(rename = "f")]
    pub name: String,
    #[serde(rename = "t")]
    pub mime_type: String,
    #[serde(rename = "c", with = "flag")]
    pub compressed: bool,
}

/// A recovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Frames `data` with its metadata, deflating it when `compress` is set and
/// deflate actually saves space.
pub fn prepare(data: &[u8], name: &str, mime_type: &str, compress: bool) -> Result<Vec<u8>, PayloadError> {
    let deflated = if compress { compress_if_smaller(data)? } else { None };
    let compressed = deflated.is_some();
    let body = deflated.as_deref().unwrap_or(data);

    let metadata = FileMetadata {
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        compressed,
    };
    let metadata_bytes = serde_json::to_vec(&metadata)?;
    let metadata_len = u16::try_from(metadata_bytes.len())
        .map_err(|_| PayloadError::MalformedPayload("file metadata exceeds 65535 bytes".into()))?;

    debug!(
        original = data.len(),
        stored = body.len(),
        compressed,
        "prepared payload"
    );

    let mut out = Vec::with_capacity(2 + metadata_bytes.len() + body.len());
    out.extend_from_slice(&metadata_len.to_be_bytes());
    out.extend_from_slice(&metadata_bytes);
    out.extend_from_slice(body);
    Ok(out)
}

/// Splits a prepared payload into metadata and the stored (possibly deflated) bytes.
pub fn parse(prepared: &[u8]) -> Result<(FileMetadata, &[u8]), PayloadError> {
    if prepared.len() < 2 {
        return Err(PayloadError::MalformedPayload("missing metadata length".into()));
    }
    let metadata_len = usize::from(u16::from_be_bytes([prepared[0], prepared[1]]));
    let metadata_end = 2 + metadata_len;
    if metadata_end > prepared.len() {
        return Err(PayloadError::MalformedPayload(format!(
            "metadata length {} exceeds payload of {} bytes",
            metadata_len,
            prepared.len()
        )));
    }

    let metadata: FileMetadata = serde_json::from_slice(&prepared[2..metadata_end])
        .map_err(|e| PayloadError::MalformedPayload(format!("invalid metadata: {}", e)))?;
    Ok((metadata, &prepared[metadata_end..]))
}

/// Parses a prepared payload and inflates the body when needed.
pub fn unpack(prepared: &[u8]) -> Result<DecodedFile, PayloadError> {
    let (metadata, body) = parse(prepared)?;
    let data = if metadata.compressed {
        decompress(body)?
    } else {
        body.to_vec()
    };
    Ok(DecodedFile {
        name: metadata.name,
        mime_type: metadata.mime_type,
        data,
    })
}

/// Serializes the compression flag as `0`/`1`.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}
