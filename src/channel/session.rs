//! Channel session: handshake state machine plus the ratchet.
//!
//! Holds all channel state in memory. `send` and `receive` take `&mut self`,
//! so calls on one channel are serialized by construction.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::error::ChannelError;
use super::handshake::{
    build_offer, build_reply, derive_pake_keys, open_offer, open_reply, HandshakePayload, OpenedWith, PakeKeys,
};
use super::message::{
    decode_envelope, encode_envelope, pad, padded_len, unpad, ChannelMessage, DURESS_REPLIES,
};
use super::ratchet::RatchetState;
use crate::config::ChannelConfig;
use crate::crypto::{DhKeyPair, KdfProfile};

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    /// Offer sent, waiting for the reply.
    Initiated,
    Complete,
}

impl HandshakeState {
    fn name(self) -> &'static str {
        match self {
            HandshakeState::Idle => "idle",
            HandshakeState::Initiated => "initiated",
            HandshakeState::Complete => "complete",
        }
    }
}

/// What the channel carries once established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Uninitialized,
    /// Real content.
    Secure,
    /// Real ratchet traffic carrying substituted content.
    Duress,
}

impl From<OpenedWith> for ChannelMode {
    fn from(opened: OpenedWith) -> Self {
        match opened {
            OpenedWith::Real => ChannelMode::Secure,
            OpenedWith::Duress => ChannelMode::Duress,
        }
    }
}

/// Initiator state between offer and reply.
struct PendingOffer {
    ephemeral: DhKeyPair,
    keys: PakeKeys,
}

/// A deniable double-ratchet channel.
pub struct Channel {
    channel_id: String,
    config: ChannelConfig,
    profile: KdfProfile,
    state: HandshakeState,
    mode: ChannelMode,
    pending: Option<PendingOffer>,
    ratchet: Option<RatchetState>,
}

impl Channel {
    pub fn new(channel_id: impl Into<String>, config: ChannelConfig) -> Self {
        Self {
            channel_id: channel_id.into(),
            config,
            profile: KdfProfile::default(),
            state: HandshakeState::Idle,
            mode: ChannelMode::Uninitialized,
            pending: None,
            ratchet: None,
        }
    }

    pub fn with_profile(mut self, profile: KdfProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    fn expect_state(&self, expected: HandshakeState) -> Result<(), ChannelError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ChannelError::InvalidState {
                expected: expected.name(),
                actual: self.state.name(),
            })
        }
    }

    /// Starts a handshake. Returns the offer JSON for the peer.
    pub fn initiate(&mut self, handshake_key: &str, duress_key: &str) -> Result<String, ChannelError> {
        self.expect_state(HandshakeState::Idle)?;

        let keys = derive_pake_keys(handshake_key, duress_key, &self.channel_id, self.profile.handshake)?;
        let ephemeral = DhKeyPair::generate();
        let offer = build_offer(&keys, &ephemeral.public_bytes())?.to_json()?;

        self.pending = Some(PendingOffer { ephemeral, keys });
        self.state = HandshakeState::Initiated;
        debug!(channel = %self.channel_id, "handshake offer created");
        Ok(offer)
    }

    /// Answers an offer. Returns the reply for the initiator.
    ///
    /// If neither key opens the offer the channel is reset and
    /// [`ChannelError::HandshakeFailure`] is returned.
    pub fn respond(&mut self, offer: &str, handshake_key: &str, duress_key: &str) -> Result<String, ChannelError> {
        self.expect_state(HandshakeState::Idle)?;

        let result = self.respond_inner(offer, handshake_key, duress_key);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn respond_inner(&mut self, offer: &str, handshake_key: &str, duress_key: &str) -> Result<String, ChannelError> {
        let offer = HandshakePayload::from_json(offer)?;
        let keys = derive_pake_keys(handshake_key, duress_key, &self.channel_id, self.profile.handshake)?;
        let (opened, initiator_public) = open_offer(&offer, &keys)?;

        let reply_pair = DhKeyPair::generate();
        let reply_key = match opened {
            OpenedWith::Real => &keys.real,
            OpenedWith::Duress => &keys.duress,
        };
        let reply = build_reply(reply_key, &reply_pair.public_bytes())?;

        self.ratchet = Some(RatchetState::new_responder(&reply_pair, initiator_public, self.config)?);
        self.mode = opened.into();
        self.state = HandshakeState::Complete;
        self.log_established();
        Ok(reply)
    }

    /// Finishes a handshake from the responder's reply.
    pub fn complete(&mut self, reply: &str) -> Result<ChannelMode, ChannelError> {
        self.expect_state(HandshakeState::Initiated)?;
        let pending = self
            .pending
            .take()
            .ok_or(ChannelError::RatchetStateInvalid("no pending offer"))?;

        let (opened, responder_public) = match open_reply(reply, &pending.keys) {
            Ok(opened) => opened,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };

        self.ratchet = Some(RatchetState::new_initiator(
            pending.ephemeral,
            responder_public,
            self.config,
        )?);
        self.mode = opened.into();
        self.state = HandshakeState::Complete;
        self.log_established();
        Ok(self.mode)
    }

    fn log_established(&self) {
        // Never log the mode
        info!(channel = %self.channel_id, "channel established");
    }

    fn ratchet_mut(&mut self) -> Result<&mut RatchetState, ChannelError> {
        self.expect_state(HandshakeState::Complete)?;
        self.ratchet
            .as_mut()
            .ok_or(ChannelError::RatchetStateInvalid("no ratchet state"))
    }

    /// Encrypts a message and returns the envelope JSON.
    ///
    /// In duress mode the ratchet advances exactly as in secure mode, but
    /// the plaintext is a bland reply padded to the size `text` would have.
    pub fn send(&mut self, text: &str) -> Result<String, ChannelError> {
        let mode = self.mode;
        let ratchet = self.ratchet_mut()?;

        let real = serde_json::to_vec(&ChannelMessage::now(text))?;
        let target = padded_len(real.len());
        let body = match mode {
            ChannelMode::Duress => serde_json::to_vec(&ChannelMessage::now(random_reply()))?,
            _ => real,
        };

        let (header, ciphertext) = ratchet.encrypt(&pad(&body, target)?)?;
        encode_envelope(&header, &ciphertext)
    }

    /// Decrypts an envelope.
    ///
    /// In duress mode no decryption is attempted and a bland reply is
    /// returned for any well-formed envelope.
    pub fn receive(&mut self, envelope: &str) -> Result<ChannelMessage, ChannelError> {
        let mode = self.mode;
        let ratchet = self.ratchet_mut()?;
        let (header, ciphertext) = decode_envelope(envelope)?;

        if mode == ChannelMode::Duress {
            return Ok(ChannelMessage::now(random_reply()));
        }

        let padded = ratchet.decrypt(&header, &ciphertext).map_err(|e| {
            warn!(n = header.n, "failed to decrypt channel message");
            e
        })?;
        serde_json::from_slice(unpad(&padded)?).map_err(|e| ChannelError::MalformedEnvelope(e.to_string()))
    }

    /// Discards all handshake and ratchet state.
    pub fn reset(&mut self) {
        self.pending = None;
        self.ratchet = None;
        self.state = HandshakeState::Idle;
        self.mode = ChannelMode::Uninitialized;
        debug!(channel = %self.channel_id, "channel reset");
    }
}

fn random_reply() -> &'static str {
    DURESS_REPLIES.choose(&mut OsRng).copied().unwrap_or(DURESS_REPLIES[0])
}
