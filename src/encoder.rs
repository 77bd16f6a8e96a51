//! File encoding pipeline.
//!
//! This module orchestrates the encoding process:
//! 1. Scrub image metadata (optional re-encode to PNG)
//! 2. Frame the file with its metadata, deflating if it helps
//! 3. Derive the effective Alpha/Omega keys (hardening, hybrid)
//! 4. Scatter into digital dust: the real blob plus decoys, shuffled
//! 5. Veil the whole blob set
//! 6. Serialize as a unified payload
//!
//! With `acoustic_resonance` the file is instead sealed into a carrier image
//! under the carrier-bound key (see [`Encoder::encode_to_carrier`]).

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{EngineConfig, PayloadFormat};
use crate::crypto::KdfProfile;
use crate::dust::{scatter, BlobKeys, DecoyContentProvider, DustError, StaticDecoyProvider};
use crate::keys::{harden_key, hybridize, OperationalKeys, ALPHA_HARDEN_LABEL, OMEGA_HARDEN_LABEL};
use crate::payload::{armor, prepare, PayloadError, UnifiedPayload};
use crate::stego::ark::{self, ArkError};
use crate::stego::image::{scrub_to_png, ImageStegoError};
use crate::veil::veil;

/// Errors that can occur during encoding.
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Digital dust error: {0}")]
    Dust(#[from] DustError),

    #[error("Could not scrub image metadata: {0}")]
    Scrub(#[from] ImageStegoError),

    #[error("Carrier-bound sealing failed: {0}")]
    Ark(#[from] ArkError),
}

/// A file to encode.
#[derive(Debug, Clone, Copy)]
pub struct FileInput<'a> {
    pub data: &'a [u8],
    pub name: &'a str,
    pub mime_type: &'a str,
}

/// Result of encoding a file.
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    pub payload: UnifiedPayload,
    pub format: PayloadFormat,
}

impl EncodedPayload {
    /// Number of blobs, real and decoy.
    pub fn blob_count(&self) -> usize {
        self.payload.blobs.len()
    }

    /// Base64 text for copy/paste.
    pub fn to_text(&self) -> Result<String, EncoderError> {
        Ok(self.payload.to_text(self.format)?)
    }

    /// Raw serialized payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncoderError> {
        Ok(self.payload.to_bytes(self.format)?)
    }

    /// Payload wrapped in an armored PNG.
    pub fn to_armored_png(&self) -> Result<Vec<u8>, EncoderError> {
        Ok(armor(&self.to_bytes()?)?)
    }
}

/// Applies hardening and the hybrid placeholder to the operational keys.
///
/// Encoding and decoding derive their keys through this one function, so a
/// settings mismatch yields a different key rather than wrong plaintext.
pub fn effective_blob_keys(keys: &OperationalKeys, config: &EngineConfig) -> BlobKeys {
    let config_byte = config.hardening_flags().config_byte();

    let mut alpha = keys.alpha.clone();
    let mut omega = keys.omega.clone();

    if config.key_hardening {
        alpha = harden_key(&alpha, ALPHA_HARDEN_LABEL, config_byte);
        omega = omega.map(|k| harden_key(&k, OMEGA_HARDEN_LABEL, config_byte));
    }

    if config.pq_hybrid {
        warn!("pq_hybrid is a non-reproducible placeholder; this payload cannot be decoded");
        alpha = hybridize(&alpha);
        omega = omega.map(|k| hybridize(&k));
    }

    BlobKeys {
        alpha,
        omega,
        decoy: keys.decoy.clone(),
        block_permutation: config.block_permutation,
    }
}

/// Drives the encoding pipeline.
pub struct Encoder {
    config: EngineConfig,
    profile: KdfProfile,
    provider: Arc<dyn DecoyContentProvider>,
}

impl Encoder {
    /// Creates an encoder with default costs and the built-in decoy texts.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            profile: KdfProfile::default(),
            provider: Arc::new(StaticDecoyProvider),
        }
    }

    pub fn with_profile(mut self, profile: KdfProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn DecoyContentProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn scrubbed(&self, file: FileInput<'_>) -> Result<(Vec<u8>, String), EncoderError> {
        if self.config.scrubber && file.mime_type.starts_with("image/") {
            Ok((scrub_to_png(file.data)?, "image/png".into()))
        } else {
            Ok((file.data.to_vec(), file.mime_type.into()))
        }
    }

    /// Encodes `file` under `keys`.
    pub async fn encode(&self, file: FileInput<'_>, keys: &OperationalKeys) -> Result<EncodedPayload, EncoderError> {
        let (data, mime_type) = self.scrubbed(file)?;

        let prepared = prepare(&data, file.name, &mime_type, self.config.compression)?;
        let blob_keys = effective_blob_keys(keys, &self.config);

        let blobs = scatter(
            &prepared,
            &blob_keys,
            self.config.deniability_level,
            self.config.dynamic_decoys,
            &self.profile,
            self.provider.as_ref(),
        )
        .await?;

        let (seed, veiled) = veil(blobs);
        let payload = UnifiedPayload::new(seed, veiled)?;

        info!(
            file_size = file.data.len(),
            blobs = payload.blobs.len(),
            format = ?self.config.payload_format,
            "encoded file"
        );

        Ok(EncodedPayload {
            payload,
            format: self.config.payload_format,
        })
    }

    /// Seals `file` into `carrier` under the carrier-bound key.
    ///
    /// Returns the stego image as PNG. Opening it needs the Alpha key and the
    /// unchanged carrier bytes; there are no decoys on this path.
    pub fn encode_to_carrier(
        &self,
        file: FileInput<'_>,
        carrier: &[u8],
        keys: &OperationalKeys,
    ) -> Result<Vec<u8>, EncoderError> {
        let (data, mime_type) = self.scrubbed(file)?;
        let png = ark::seal(carrier, &data, file.name, &mime_type, &keys.alpha, self.config.compression)?;
        info!(file_size = file.data.len(), image_size = png.len(), "sealed file into carrier");
        Ok(png)
    }
}
