//! Unified payload: the veil seed plus every blob, real and decoy.
//!
//! Binary layout:
//!
//! ```text
//! [0xBD][48-byte veil seed][blob count: u8][count x u32 BE length][blob bytes...]
//! ```
//!
//! The legacy JSON layout is `{"q": base64(seed), "d": "b64|b64|..."}`.
//! Both layouts travel as base64 when sent as text.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use super::PayloadError;
use crate::config::PayloadFormat;
use crate::crypto::prng::MATERIAL_LEN;
use crate::crypto::PrngMaterial;

/// Leading byte of the binary layout.
pub const MAGIC_BINARY: u8 = 0xBD;

/// Most blobs one payload can carry.
pub const MAX_BLOBS: usize = u8::MAX as usize;

/// Fixed bytes before the length table.
const HEADER_LEN: usize = 1 + MATERIAL_LEN + 1;

/// Legacy JSON shape.
#[derive(Serialize, Deserialize)]
struct JsonPayload {
    q: String,
    d: String,
}

/// The transmitted bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedPayload {
    /// Seed for the entropic veil. Travels in the clear.
    pub veil: PrngMaterial,
    /// Veiled blobs in transmission order.
    pub blobs: Vec<Vec<u8>>,
}

impl UnifiedPayload {
    pub fn new(veil: PrngMaterial, blobs: Vec<Vec<u8>>) -> Result<Self, PayloadError> {
        if blobs.is_empty() || blobs.len() > MAX_BLOBS {
            return Err(PayloadError::MalformedPayload(format!(
                "blob count {} outside 1..={}",
                blobs.len(),
                MAX_BLOBS
            )));
        }
        Ok(Self { veil, blobs })
    }

    /// Serializes to the binary layout.
    pub fn to_binary(&self) -> Result<Vec<u8>, PayloadError> {
        let count = u8::try_from(self.blobs.len())
            .map_err(|_| PayloadError::MalformedPayload("too many blobs".into()))?;
        let body_len: usize = self.blobs.iter().map(Vec::len).sum();

        let mut out = Vec::with_capacity(HEADER_LEN + self.blobs.len() * 4 + body_len);
        out.push(MAGIC_BINARY);
        out.extend_from_slice(&self.veil.to_bytes());
        out.push(count);
        for blob in &self.blobs {
            let len = u32::try_from(blob.len())
                .map_err(|_| PayloadError::MalformedPayload("blob exceeds 4 GiB".into()))?;
            out.extend_from_slice(&len.to_be_bytes());
        }
        for blob in &self.blobs {
            out.extend_from_slice(blob);
        }
        Ok(out)
    }

    /// Parses the binary layout. The length table must account for every byte.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() < HEADER_LEN {
            return Err(PayloadError::MalformedPayload("payload header truncated".into()));
        }
        if bytes[0] != MAGIC_BINARY {
            return Err(PayloadError::MalformedPayload(format!(
                "unknown format byte 0x{:02X}",
                bytes[0]
            )));
        }
        let veil = PrngMaterial::from_bytes(&bytes[1..1 + MATERIAL_LEN])
            .ok_or_else(|| PayloadError::MalformedPayload("veil seed truncated".into()))?;
        let count = usize::from(bytes[HEADER_LEN - 1]);

        let table_end = HEADER_LEN + count * 4;
        if bytes.len() < table_end {
            return Err(PayloadError::MalformedPayload("length table truncated".into()));
        }

        let mut offset = table_end;
        let mut blobs = Vec::with_capacity(count);
        for entry in bytes[HEADER_LEN..table_end].chunks_exact(4) {
            let len = u32::from_be_bytes([entry[0], entry[1], entry[2], entry[3]]) as usize;
            let end = offset
                .checked_add(len)
                .filter(|&end| end <= bytes.len())
                .ok_or_else(|| PayloadError::MalformedPayload("blob length exceeds payload".into()))?;
            blobs.push(bytes[offset..end].to_vec());
            offset = end;
        }
        if offset != bytes.len() {
            return Err(PayloadError::MalformedPayload(format!(
                "{} trailing bytes after last blob",
                bytes.len() - offset
            )));
        }

        Self::new(veil, blobs)
    }

    /// Serializes to the legacy JSON layout.
    pub fn to_json(&self) -> Result<Vec<u8>, PayloadError> {
        let json = JsonPayload {
            q: BASE64.encode(self.veil.to_bytes()),
            d: self
                .blobs
                .iter()
                .map(|blob| BASE64.encode(blob))
                .collect::<Vec<_>>()
                .join("|"),
        };
        Ok(serde_json::to_vec(&json)?)
    }

    /// Parses the legacy JSON layout.
    pub fn from_json(bytes: &[u8]) -> Result<Self, PayloadError> {
        let json: JsonPayload = serde_json::from_slice(bytes)
            .map_err(|e| PayloadError::MalformedPayload(format!("invalid JSON payload: {}", e)))?;
        let seed = BASE64
            .decode(json.q.as_bytes())
            .map_err(|_| PayloadError::MalformedPayload("veil seed is not base64".into()))?;
        let veil = PrngMaterial::from_bytes(&seed)
            .ok_or_else(|| PayloadError::MalformedPayload("veil seed has wrong length".into()))?;

        let blobs = json
            .d
            .split('|')
            .map(|part| BASE64.decode(part.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| PayloadError::MalformedPayload("blob is not base64".into()))?;

        Self::new(veil, blobs)
    }

    /// Serializes in the requested layout.
    pub fn to_bytes(&self, format: PayloadFormat) -> Result<Vec<u8>, PayloadError> {
        match format {
            PayloadFormat::Binary => self.to_binary(),
            PayloadFormat::Json => self.to_json(),
        }
    }

    /// Parses either layout, detected from the first byte.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PayloadError> {
        match bytes.first() {
            Some(&MAGIC_BINARY) => Self::from_binary(bytes),
            Some(b'{') => Self::from_json(bytes),
            Some(other) => Err(PayloadError::MalformedPayload(format!(
                "unknown format byte 0x{:02X}",
                other
            ))),
            None => Err(PayloadError::MalformedPayload("empty payload".into())),
        }
    }

    /// Base64 text form for copy/paste transport.
    pub fn to_text(&self, format: PayloadFormat) -> Result<String, PayloadError> {
        Ok(BASE64.encode(self.to_bytes(format)?))
    }

    /// Parses the text form. Whitespace (line wrapping) is ignored.
    pub fn from_text(text: &str) -> Result<Self, PayloadError> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64
            .decode(compact.as_bytes())
            .map_err(|_| PayloadError::MalformedPayload("payload text is not base64".into()))?;
        Self::from_bytes(&bytes)
    }
}
