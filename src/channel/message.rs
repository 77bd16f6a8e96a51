//! Wire formats for channel messages.
//!
//! Envelope: `{"h": {"dh_pub": base64, "n": int, "pn": int}, "c": base64}`.
//! The plaintext inside `c` is a length-prefixed JSON body padded to a
//! bucket size, so equal-length inputs always yield equal-length envelopes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::error::ChannelError;

/// Smallest padded plaintext.
pub const MIN_PADDED_LEN: usize = 128;

/// Padded plaintexts grow in steps of this many bytes.
pub const PAD_BLOCK: usize = 64;

/// Bland replies substituted for real content in duress mode.
pub const DURESS_REPLIES: [&str; 6] = [
    "Okay, sounds good.",
    "Message received.",
    "Got it, thanks.",
    "I'll look into it.",
    "Acknowledged.",
    "Understood.",
];

/// Ratchet header, sent in the clear and bound to the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Sender's current ratchet public key.
    pub dh_pub: [u8; 32],
    /// Message number in the sending chain.
    pub n: u32,
    /// Length of the sender's previous sending chain.
    pub pn: u32,
}

#[derive(Serialize, Deserialize)]
struct WireHeader {
    dh_pub: String,
    n: u32,
    pn: u32,
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    h: WireHeader,
    c: String,
}

/// Serializes a header and ciphertext as an envelope.
pub fn encode_envelope(header: &MessageHeader, ciphertext: &[u8]) -> Result<String, ChannelError> {
    let envelope = WireEnvelope {
        h: WireHeader {
            dh_pub: BASE64.encode(header.dh_pub),
            n: header.n,
            pn: header.pn,
        },
        c: BASE64.encode(ciphertext),
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parses an envelope into header and ciphertext.
pub fn decode_envelope(envelope: &str) -> Result<(MessageHeader, Vec<u8>), ChannelError> {
    let wire: WireEnvelope = serde_json::from_str(envelope.trim())
        .map_err(|e| ChannelError::MalformedEnvelope(e.to_string()))?;

    let dh_pub = BASE64
        .decode(&wire.h.dh_pub)
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes.as_slice()).ok())
        .ok_or_else(|| ChannelError::MalformedEnvelope("dh_pub is not a 32-byte key".into()))?;
    let ciphertext = BASE64
        .decode(&wire.c)
        .map_err(|_| ChannelError::MalformedEnvelope("ciphertext is not base64".into()))?;

    Ok((
        MessageHeader {
            dh_pub,
            n: wire.h.n,
            pn: wire.h.pn,
        },
        ciphertext,
    ))
}

/// A decrypted channel message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub content: String,
    /// Milliseconds since the Unix epoch, set by the sender.
    pub timestamp: u64,
}

impl ChannelMessage {
    pub fn now(content: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            content: content.into(),
            timestamp,
        }
    }
}

/// Padded size for a body of `body_len` bytes.
pub fn padded_len(body_len: usize) -> usize {
    let framed = 4 + body_len;
    MIN_PADDED_LEN.max(framed.div_ceil(PAD_BLOCK) * PAD_BLOCK)
}

/// Frames `body` with a u32 length and zero-pads to `target` bytes.
pub fn pad(body: &[u8], target: usize) -> Result<Vec<u8>, ChannelError> {
    let len = u32::try_from(body.len())
        .map_err(|_| ChannelError::MalformedEnvelope("message too large".into()))?;
    let mut out = Vec::with_capacity(target.max(4 + body.len()));
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(body);
    out.resize(target.max(out.len()), 0);
    Ok(out)
}

/// Inverse of [`pad`].
pub fn unpad(padded: &[u8]) -> Result<&[u8], ChannelError> {
    if padded.len() < 4 {
        return Err(ChannelError::MalformedEnvelope("padded body too short".into()));
    }
    let len = u32::from_be_bytes([padded[0], padded[1], padded[2], padded[3]]) as usize;
    padded
        .get(4..4 + len)
        .ok_or_else(|| ChannelError::MalformedEnvelope("body length exceeds padding".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let header = MessageHeader {
            dh_pub: [7u8; 32],
            n: 3,
            pn: 1,
        };
        let json = encode_envelope(&header, b"ciphertext").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["h"]["n"], 3);
        assert_eq!(value["h"]["pn"], 1);
        assert!(value["h"]["dh_pub"].is_string());
        assert!(value["c"].is_string());

        let (parsed, ciphertext) = decode_envelope(&json).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(ciphertext, b"ciphertext");
    }

    #[test]
    fn test_bad_envelopes() {
        assert!(decode_envelope("not json").is_err());
        assert!(decode_envelope(r#"{"h":{"dh_pub":"AAAA","n":0,"pn":0},"c":""}"#).is_err());
    }

    #[test]
    fn test_padding_buckets() {
        assert_eq!(padded_len(0), 128);
        assert_eq!(padded_len(124), 128);
        assert_eq!(padded_len(125), 192);
        assert_eq!(padded_len(188), 192);
        assert_eq!(padded_len(189), 256);
    }

    #[test]
    fn test_pad_unpad() {
        let padded = pad(b"hello", 128).unwrap();
        assert_eq!(padded.len(), 128);
        assert_eq!(unpad(&padded).unwrap(), b"hello");
        assert!(unpad(&[0, 0, 1, 0, 1]).is_err());
    }
}
