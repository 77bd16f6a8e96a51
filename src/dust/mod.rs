//! Digital dust: one real blob hidden among decoys.
//!
//! Encoding seals the prepared payload under the real keys and surrounds it
//! with independently sealed decoy texts, then shuffles the set. Decoding
//! ("decoherence") tries every blob and classifies each one.

pub mod decoherence;
pub mod decoys;
pub mod engine;

pub use decoherence::{decohere, BlobReport, BlobStatus, DecoherenceReport, Decohered, KeyUsed};
pub use decoys::{
    gather_decoy_texts, ConfiguredDecoyProvider, DecoyContentProvider, DecoyError, StaticDecoyProvider,
};
pub use engine::{open_real_blob, scatter, seal_real_blob};

use thiserror::Error;

use crate::crypto::{KdfError, SymmetricError};
use crate::keys::SecretKey;
use crate::payload::PayloadError;

/// Errors from the digital dust engine.
#[derive(Error, Debug)]
pub enum DustError {
    #[error("Encryption error: {0}")]
    Symmetric(#[from] SymmetricError),

    #[error("Key derivation error: {0}")]
    Kdf(#[from] KdfError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for DustError {
    fn from(e: tokio::task::JoinError) -> Self {
        DustError::Task(e.to_string())
    }
}

/// Effective keys for sealing or opening blobs.
///
/// `alpha` and `omega` are already hardened/hybridized as configured;
/// `decoy` is only normalized.
#[derive(Debug, Clone)]
pub struct BlobKeys {
    pub alpha: SecretKey,
    pub omega: Option<SecretKey>,
    pub decoy: Option<SecretKey>,
    /// Apply the keyed byte permutation to the real blob.
    pub block_permutation: bool,
}
