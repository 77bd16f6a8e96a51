//! File decoding pipeline.
//!
//! This module orchestrates the decoding process:
//! 1. Detect the transport (armored PNG, raw payload, base64 text)
//! 2. Parse the unified payload
//! 3. Lift the entropic veil
//! 4. Decohere: classify every blob as real, decoy or failure
//!
//! Unlike encoding, a missing real blob is an error that still carries the
//! full per-blob report. Carrier-bound images are opened with
//! [`Decoder::decode_from_carrier`].

use thiserror::Error;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::dust::{decohere, decoherence::short_hash, DecoherenceReport, DustError};
use crate::encoder::effective_blob_keys;
use crate::keys::OperationalKeys;
use crate::payload::{dearmor, DecodedFile, PayloadError, UnifiedPayload, MAGIC_BINARY};
use crate::stego::ark::{self, ArkError};
use crate::veil::unveil;

/// Errors that can occur during decoding.
#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("Malformed payload: {0}")]
    Malformed(#[from] PayloadError),

    #[error("Digital dust error: {0}")]
    Dust(#[from] DustError),

    /// No blob decrypted under the real keys.
    #[error("Decoherence failure: keys incorrect or data corrupt")]
    DecoherenceFailure { report: Box<DecoherenceReport> },

    #[error("Carrier-bound open failed: {0}")]
    Ark(#[from] ArkError),
}

/// Result of decoding a payload.
#[derive(Debug, Clone)]
pub struct DecodeOutcome {
    pub file: DecodedFile,
    pub report: DecoherenceReport,
}

/// Parses a unified payload from whatever transport it arrived in.
///
/// Armored PNGs are unwrapped first; raw payload bytes are recognized by their
/// first byte; anything else must be base64 text.
pub fn parse_transport(input: &[u8]) -> Result<UnifiedPayload, PayloadError> {
    if let Some(inner) = dearmor(input) {
        return UnifiedPayload::from_bytes(&inner);
    }
    match input.first() {
        Some(&MAGIC_BINARY) | Some(b'{') => UnifiedPayload::from_bytes(input),
        _ => {
            let text = std::str::from_utf8(input)
                .map_err(|_| PayloadError::MalformedPayload("unrecognized payload transport".into()))?;
            UnifiedPayload::from_text(text)
        }
    }
}

/// Drives the decoding pipeline.
pub struct Decoder {
    config: EngineConfig,
}

impl Decoder {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Decodes a payload in any supported transport.
    pub async fn decode(&self, input: &[u8], keys: &OperationalKeys) -> Result<DecodeOutcome, DecoderError> {
        let payload = parse_transport(input)?;
        self.decode_payload(payload, keys).await
    }

    /// Decodes an already parsed payload.
    pub async fn decode_payload(
        &self,
        payload: UnifiedPayload,
        keys: &OperationalKeys,
    ) -> Result<DecodeOutcome, DecoderError> {
        let UnifiedPayload { veil, blobs } = payload;
        let hashes: Vec<String> = blobs.iter().map(|b| short_hash(b)).collect();
        let blobs = unveil(&veil, blobs);

        let blob_keys = effective_blob_keys(keys, &self.config);
        let decohered = decohere(blobs, hashes, &blob_keys).await?;

        match decohered.file {
            Some(file) => {
                info!(name = %file.name, size = file.data.len(), "decoded file");
                Ok(DecodeOutcome {
                    file,
                    report: decohered.report,
                })
            }
            None => {
                warn!(blobs = decohered.report.blobs.len(), "no blob decrypted under the real keys");
                Err(DecoderError::DecoherenceFailure {
                    report: Box::new(decohered.report),
                })
            }
        }
    }

    /// Opens a stego image sealed with [`Encoder::encode_to_carrier`].
    ///
    /// [`Encoder::encode_to_carrier`]: crate::encoder::Encoder::encode_to_carrier
    pub fn decode_from_carrier(
        &self,
        original_carrier: &[u8],
        stego_image: &[u8],
        keys: &OperationalKeys,
    ) -> Result<DecodedFile, DecoderError> {
        let file = ark::open(original_carrier, stego_image, &keys.alpha)?;
        info!(name = %file.name, size = file.data.len(), "opened carrier-bound file");
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayloadFormat;
    use crate::crypto::{KdfProfile, PrngMaterial};
    use crate::dust::BlobStatus;
    use crate::encoder::{Encoder, FileInput};
    use crate::keys::SecretKey;
    use crate::stego::image::tests::create_test_image;
    use crate::stego::image::ImageStego;

    fn keys() -> OperationalKeys {
        OperationalKeys {
            alpha: SecretKey::from_bytes([7u8; 32]),
            omega: None,
            decoy: None,
        }
    }

    async fn encoded(config: &EngineConfig) -> Vec<u8> {
        let encoder = Encoder::new(config.clone()).with_profile(KdfProfile::insecure_fast());
        let file = FileInput {
            data: b"attack at dawn",
            name: "orders.txt",
            mime_type: "text/plain",
        };
        encoder.encode(file, &keys()).await.unwrap().to_bytes().unwrap()
    }

    #[test]
    fn test_parse_transport_rejects_garbage() {
        assert!(parse_transport(&[0xFF, 0xFE, 0x00]).is_err());
        assert!(parse_transport(b"not base64 at all!").is_err());
    }

    #[test]
    fn test_parse_transport_detects_all_forms() {
        let payload = UnifiedPayload::new(PrngMaterial::random(), vec![vec![1, 2, 3]]).unwrap();
        let binary = payload.to_binary().unwrap();

        assert_eq!(parse_transport(&binary).unwrap(), payload);
        assert_eq!(parse_transport(&payload.to_json().unwrap()).unwrap(), payload);
        assert_eq!(
            parse_transport(payload.to_text(PayloadFormat::Binary).unwrap().as_bytes()).unwrap(),
            payload
        );
        assert_eq!(parse_transport(&crate::payload::armor(&binary).unwrap()).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_decode_recovers_file() {
        let config = EngineConfig::default();
        let bytes = encoded(&config).await;

        let outcome = Decoder::new(config).decode(&bytes, &keys()).await.unwrap();
        assert_eq!(outcome.file.data, b"attack at dawn");
        assert_eq!(outcome.file.name, "orders.txt");
        assert_eq!(outcome.report.count(BlobStatus::RealPayload), 1);
    }

    #[tokio::test]
    async fn test_settings_mismatch_fails_closed() {
        let config = EngineConfig::default();
        let bytes = encoded(&config).await;

        let other = EngineConfig {
            block_permutation: true,
            ..config
        };
        let err = Decoder::new(other).decode(&bytes, &keys()).await.unwrap_err();
        match err {
            DecoderError::DecoherenceFailure { report } => {
                assert_eq!(report.count(BlobStatus::RealPayload), 0);
                assert_eq!(report.blobs.len(), 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_carrier_route_round_trip() {
        let config = EngineConfig::from_preset(crate::config::Preset::Paranoid);
        let carrier = ImageStego::from_image(create_test_image(96, 96)).to_png_bytes().unwrap();
        let other = ImageStego::from_image(create_test_image(97, 96)).to_png_bytes().unwrap();
        let file = FileInput {
            data: b"meet at the pier",
            name: "note.txt",
            mime_type: "text/plain",
        };

        let png = Encoder::new(config.clone())
            .encode_to_carrier(file, &carrier, &keys())
            .unwrap();
        let decoder = Decoder::new(config);

        let opened = decoder.decode_from_carrier(&carrier, &png, &keys()).unwrap();
        assert_eq!(opened.data, b"meet at the pier");
        assert_eq!(opened.name, "note.txt");
        assert!(matches!(
            decoder.decode_from_carrier(&other, &png, &keys()),
            Err(DecoderError::Ark(_))
        ));
    }

    #[tokio::test]
    async fn test_pq_hybrid_does_not_round_trip() {
        let config = EngineConfig {
            pq_hybrid: true,
            ..EngineConfig::default()
        };
        let bytes = encoded(&config).await;

        let result = Decoder::new(config).decode(&bytes, &keys()).await;
        assert!(matches!(result, Err(DecoderError::DecoherenceFailure { .. })));
    }
}
