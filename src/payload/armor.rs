//! Armored PNG transport.
//!
//! The payload rides behind a valid 1x1 PNG so the file opens in any image
//! viewer: `[minimal PNG][payload bytes]["CHIMERA_ARMOR_V1"]`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::PayloadError;

/// Trailing marker identifying an armored file.
pub const ARMOR_MARKER: &[u8] = b"CHIMERA_ARMOR_V1";

/// A 1x1 transparent PNG.
const MINIMAL_PNG_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// PNG end chunk type.
const IEND: &[u8] = b"IEND";

/// Bytes from the start of the `IEND` type field to the end of the chunk (type + CRC).
const IEND_TAIL: usize = 8;

/// Wraps payload bytes in an armored PNG.
pub fn armor(payload: &[u8]) -> Result<Vec<u8>, PayloadError> {
    let png = BASE64
        .decode(MINIMAL_PNG_B64)
        .map_err(|e| PayloadError::MalformedPayload(format!("bad PNG template: {}", e)))?;

    let mut out = Vec::with_capacity(png.len() + payload.len() + ARMOR_MARKER.len());
    out.extend_from_slice(&png);
    out.extend_from_slice(payload);
    out.extend_from_slice(ARMOR_MARKER);
    Ok(out)
}

/// Extracts payload bytes from an armored PNG.
///
/// Returns `None` if the marker or the first `IEND` chunk is missing.
pub fn dearmor(armored: &[u8]) -> Option<Vec<u8>> {
    let marker_at = rfind(armored, ARMOR_MARKER)?;
    let iend_at = find(armored, IEND)?;
    let start = iend_at + IEND_TAIL;
    if start > marker_at {
        return None;
    }
    Some(armored[start..marker_at].to_vec())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
