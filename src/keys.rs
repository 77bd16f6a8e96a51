//! Key management: normalization, master-key expansion and hardening.
//!
//! Every key in the engine is 32 raw bytes. Users may supply either a
//! generated key (its base64 form) or a memorable password; [`normalize_key`]
//! accepts both transparently.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{
    hash_password, hash_password_32, hkdf_32, hmac_sha512, Argon2Cost, KdfError, KdfProfile,
};

/// Argon2 salt for password normalization.
const NORMALIZE_SALT: &[u8] = b"CHIMERA-CIPHER-PBKDF-SALT-V2";

/// Argon2 salt for master-key expansion.
const MASTER_SALT: &[u8] = b"CHIMERA-CIPHER-ARGON2-SALT-V1";

/// Domain labels for the HMAC expansion chain.
const INFO_ALPHA: &[u8] = b"CHIMERA-CIPHER-ALPHA";
const INFO_OMEGA: &[u8] = b"CHIMERA-CIPHER-OMEGA";
const INFO_DECOY: &[u8] = b"CHIMERA-CIPHER-DECOY";

/// HKDF salt used when binding settings into a key.
const HARDENING_SALT: &[u8] = b"chimera-cipher-key-hardening-salt";

/// Hardening label for the Alpha key.
pub const ALPHA_HARDEN_LABEL: &[u8] = b"chimera-alpha-harden";

/// Hardening label for the Omega key.
pub const OMEGA_HARDEN_LABEL: &[u8] = b"chimera-omega-harden";

/// HKDF info for the hybrid combination.
const HYBRID_INFO: &[u8] = b"pqc-hybrid-key-derivation";

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

/// Errors that can occur during key management.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Key input is empty")]
    EmptyInput,

    #[error("Invalid key: expected 32 bytes of base64")]
    InvalidKey,

    #[error("Key derivation failed: {0}")]
    Derivation(#[from] KdfError),
}

/// A 32-byte secret key. Zeroized on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generates a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parses the canonical base64 form. Returns `None` unless it decodes to exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Option<Self> {
        let mut decoded = BASE64.decode(encoded.trim()).ok()?;
        let key = <[u8; KEY_LEN]>::try_from(decoded.as_slice()).ok().map(Self);
        decoded.zeroize();
        key
    }

    /// Canonical base64 form.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// Generates a random key in canonical base64 form.
pub fn generate_key() -> String {
    SecretKey::generate().to_base64()
}

/// Generates a channel identifier shared out of band by both peers.
pub fn generate_channel_id() -> String {
    let mut bytes = [0u8; 9];
    OsRng.fill_bytes(&mut bytes);
    format!("ccc-{}", BASE64.encode(bytes))
}

/// Turns user input into a key.
///
/// Input that base64-decodes to exactly 32 bytes is used as-is. Anything else
/// is treated as a password and stretched with the standard Argon2id cost.
pub fn normalize_key(input: &str, profile: &KdfProfile) -> Result<SecretKey, KeyError> {
    if input.is_empty() {
        return Err(KeyError::EmptyInput);
    }
    if let Some(key) = SecretKey::from_base64(input) {
        return Ok(key);
    }
    debug!("normalizing password input with argon2id");
    Ok(stretch_password(input, profile.standard)?)
}

/// Stretches a password into a key with the normalization salt at `cost`.
pub fn stretch_password(password: &str, cost: Argon2Cost) -> Result<SecretKey, KdfError> {
    hash_password_32(password.as_bytes(), NORMALIZE_SALT, cost).map(SecretKey)
}

/// Keys expanded from one master password.
#[derive(Debug, Clone)]
pub struct MasterKeys {
    pub alpha: SecretKey,
    pub omega: SecretKey,
    pub decoy: SecretKey,
}

/// Expands a master password into domain-separated Alpha, Omega and Decoy keys.
///
/// One high-cost Argon2id pass yields a 64-byte root. Each key is the first
/// half of an HMAC-SHA512 block whose input chains in the previous block.
pub fn derive_master_keys(master_password: &str, profile: &KdfProfile) -> Result<MasterKeys, KeyError> {
    if master_password.is_empty() {
        return Err(KeyError::EmptyInput);
    }
    let prk = hash_password(master_password.as_bytes(), MASTER_SALT, profile.high, 64)?;

    let mut input = Vec::with_capacity(64 + INFO_DECOY.len() + 1);
    input.extend_from_slice(INFO_ALPHA);
    input.push(0x01);
    let t1 = hmac_sha512(&prk, &input);

    input.clear();
    input.extend_from_slice(&t1);
    input.extend_from_slice(INFO_OMEGA);
    input.push(0x02);
    let t2 = hmac_sha512(&prk, &input);

    input.clear();
    input.extend_from_slice(&t2);
    input.extend_from_slice(INFO_DECOY);
    input.push(0x03);
    let t3 = hmac_sha512(&prk, &input);
    input.zeroize();

    Ok(MasterKeys {
        alpha: SecretKey(first_half(&t1)),
        omega: SecretKey(first_half(&t2)),
        decoy: SecretKey(first_half(&t3)),
    })
}

fn first_half(block: &[u8; 64]) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&block[..KEY_LEN]);
    out
}

/// Feature flags bound into hardened keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardeningFlags {
    pub block_permutation: bool,
    pub pq_hybrid: bool,
}

impl HardeningFlags {
    /// Bit 0: block permutation, bit 1: PQ hybrid.
    pub fn config_byte(&self) -> u8 {
        let mut byte = 0u8;
        if self.block_permutation {
            byte |= 1;
        }
        if self.pq_hybrid {
            byte |= 2;
        }
        byte
    }
}

/// Binds `config_byte` into `key` under a domain label.
///
/// Decoding with different settings derives a different key and fails
/// authentication instead of producing garbage.
pub fn harden_key(key: &SecretKey, label: &[u8], config_byte: u8) -> SecretKey {
    let mut info = Vec::with_capacity(label.len() + 1);
    info.extend_from_slice(label);
    info.push(config_byte);
    SecretKey(hkdf_32(key.as_bytes(), HARDENING_SALT, &info))
}

/// Mixes `key` with a fresh random secret.
///
/// This is a placeholder for a future post-quantum KEM combination, not a
/// post-quantum primitive. The random secret is neither stored nor sent, so
/// a hybridized key cannot be re-derived at decode time.
pub fn hybridize(key: &SecretKey) -> SecretKey {
    let mut placeholder_secret = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut placeholder_secret);
    let hybrid = hkdf_32(&placeholder_secret, key.as_bytes(), HYBRID_INFO);
    placeholder_secret.zeroize();
    SecretKey(hybrid)
}

/// Where the operational keys come from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    /// One master password expanded into all three keys.
    Master(String),
    /// Individually supplied keys or passwords.
    Explicit {
        alpha: String,
        omega: Option<String>,
        decoy: Option<String>,
    },
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Master(_) => f.write_str("KeySource::Master([REDACTED])"),
            KeySource::Explicit { omega, decoy, .. } => f
                .debug_struct("KeySource::Explicit")
                .field("omega", &omega.is_some())
                .field("decoy", &decoy.is_some())
                .finish(),
        }
    }
}

impl KeySource {
    /// Explicit source with only an Alpha key.
    pub fn alpha(alpha: impl Into<String>) -> Self {
        KeySource::Explicit {
            alpha: alpha.into(),
            omega: None,
            decoy: None,
        }
    }
}

impl Drop for KeySource {
    fn drop(&mut self) {
        match self {
            KeySource::Master(password) => password.zeroize(),
            KeySource::Explicit { alpha, omega, decoy } => {
                alpha.zeroize();
                omega.zeroize();
                decoy.zeroize();
            }
        }
    }
}

/// Normalized keys ready for the encode/decode pipelines.
#[derive(Debug, Clone)]
pub struct OperationalKeys {
    pub alpha: SecretKey,
    pub omega: Option<SecretKey>,
    pub decoy: Option<SecretKey>,
}

impl OperationalKeys {
    /// Resolves a [`KeySource`] into normalized keys.
    pub fn resolve(source: &KeySource, profile: &KdfProfile) -> Result<Self, KeyError> {
        match source {
            KeySource::Master(password) => {
                let MasterKeys { alpha, omega, decoy } = derive_master_keys(password, profile)?;
                Ok(Self {
                    alpha,
                    omega: Some(omega),
                    decoy: Some(decoy),
                })
            }
            KeySource::Explicit { alpha, omega, decoy } => Ok(Self {
                alpha: normalize_key(alpha, profile)?,
                omega: normalize_optional(omega.as_deref(), profile)?,
                decoy: normalize_optional(decoy.as_deref(), profile)?,
            }),
        }
    }
}

fn normalize_optional(input: Option<&str>, profile: &KdfProfile) -> Result<Option<SecretKey>, KeyError> {
    match input {
        Some(value) if !value.is_empty() => normalize_key(value, profile).map(Some),
        _ => Ok(None),
    }
}
