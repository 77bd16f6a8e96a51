//! Channel error types.

use thiserror::Error;

use crate::crypto::{KdfError, SymmetricError};

/// Errors that can occur on a ratchet channel.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Neither the real nor the duress key validated. All handshake state is gone.
    #[error("Handshake failed: neither key validates")]
    HandshakeFailure,

    /// Operation not valid in the current handshake state.
    #[error("Invalid handshake state: expected {expected}, channel is {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// Handshake and duress keys must differ.
    #[error("Handshake and duress keys must be distinct")]
    KeysNotDistinct,

    #[error("Key input is empty")]
    EmptyKey,

    /// A chain or root key needed for this direction is missing.
    #[error("Ratchet state invalid: {0}")]
    RatchetStateInvalid(&'static str),

    #[error("Message authentication failed")]
    AuthenticationFailure,

    /// Too many messages skipped in one chain.
    #[error("Too many skipped messages (max: {max}, requested: {requested})")]
    TooManySkipped { max: u32, requested: u32 },

    /// Message key already used or never cached.
    #[error("No key for message {0}: replay or expired")]
    MessageKeyUnavailable(u32),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Key derivation failed: {0}")]
    Kdf(#[from] KdfError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SymmetricError> for ChannelError {
    fn from(e: SymmetricError) -> Self {
        match e {
            SymmetricError::AuthenticationFailure | SymmetricError::CiphertextTooShort => {
                ChannelError::AuthenticationFailure
            }
            SymmetricError::EncryptionFailed(msg) => ChannelError::EncryptionFailed(msg),
        }
    }
}
