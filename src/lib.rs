//! # Chimera - layered deniable encryption
//!
//! Chimera hides a file inside a set of encrypted blobs, only one of which is
//! real. Carriers for the resulting payload are plain bytes, zero-width text or
//! image pixels, and a separate double-ratchet channel provides interactive
//! messaging with a duress mode.
//!
//! ## Overview
//!
//! - The file is framed with its metadata and optionally deflated
//! - The framed bytes are sealed under Omega (optional) and then Alpha
//! - Decoy texts are sealed under throwaway passwords or the Decoy key
//! - The blob set is shuffled and XOR-veiled with a random keystream
//! - Decoding tries every blob and reports what each one turned out to be
//!
//! ## Security Model
//!
//! - **Deniability**: a coerced party can hand over the Decoy key, which opens
//!   a plausible text and nothing else
//! - **Fail closed**: a mismatched setting or wrong key yields a
//!   [`DecoderError::DecoherenceFailure`], never garbage
//! - **Carrier binding**: with ARK, image payloads only open with the exact
//!   original carrier
//! - **Channel**: forward secrecy and post-compromise security from the
//!   ratchet, with a password-selected duress mode
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use chimera::{Decoder, Encoder, EngineConfig, FileInput, KdfProfile, KeySource, OperationalKeys};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let profile = KdfProfile::default();
//! let keys = OperationalKeys::resolve(&KeySource::Master("correct horse".into()), &profile)?;
//!
//! let encoder = Encoder::new(EngineConfig::default());
//! let encoded = encoder
//!     .encode(
//!         FileInput { data: b"meet at noon", name: "note.txt", mime_type: "text/plain" },
//!         &keys,
//!     )
//!     .await?;
//!
//! let transport = encoded.to_text()?;
//! let outcome = Decoder::new(EngineConfig::default())
//!     .decode(transport.as_bytes(), &keys)
//!     .await?;
//! assert_eq!(outcome.file.data, b"meet at noon");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: AEAD, HKDF/HMAC, Argon2id tiers, keyed PRNG, compression, X25519
//! - [`keys`]: key normalization, master-key expansion, hardening
//! - [`payload`]: prepared payload framing, unified payload, armored PNG
//! - [`dust`]: blob scattering, decoy providers, decoherence
//! - [`veil`]: XOR keystream over the blob set
//! - [`stego`]: zero-width text, image pixel dispersal, ARK
//! - [`channel`]: ARRK-DKE handshake, double ratchet, sessions
//! - [`vault`]: password-sealed key and config export

pub mod channel;
pub mod config;
pub mod crypto;
pub mod decoder;
pub mod dust;
pub mod encoder;
pub mod keys;
pub mod payload;
pub mod stego;
pub mod vault;
pub mod veil;

// Re-export commonly used types at the crate root
pub use channel::{Channel, ChannelError, ChannelMessage, ChannelMode, HandshakeState};
pub use config::{ChannelConfig, DeniabilityLevel, EngineConfig, PayloadFormat, Preset, ProviderConfig};
pub use crypto::{Argon2Cost, KdfProfile};
pub use decoder::{parse_transport, DecodeOutcome, Decoder, DecoderError};
pub use dust::{BlobReport, BlobStatus, DecoherenceReport, KeyUsed};
pub use encoder::{EncodedPayload, Encoder, EncoderError, FileInput};
pub use keys::{generate_channel_id, generate_key, KeySource, OperationalKeys, SecretKey};
pub use payload::{DecodedFile, UnifiedPayload};
pub use vault::{ExplicitKeys, VaultContents, VaultError};
