//! Argon2id password hashing with named cost tiers.
//!
//! Several derivations in the engine share the same construction but use
//! different costs. The tiers live in a [`KdfProfile`] so callers can pick a
//! cheaper profile on constrained hardware (or in tests) without touching
//! the derivation code.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::kdf::KdfError;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Cost {
    /// Number of passes.
    pub time_cost: u32,
    /// Memory in KiB.
    pub memory_kib: u32,
    /// Lanes.
    pub parallelism: u32,
}

impl Argon2Cost {
    /// Interactive cost used for key normalization and decoys (32 MiB).
    pub const STANDARD: Self = Self {
        time_cost: 2,
        memory_kib: 32 * 1024,
        parallelism: 2,
    };

    /// Master-key derivation and vault sealing (64 MiB).
    pub const HIGH: Self = Self {
        time_cost: 3,
        memory_kib: 64 * 1024,
        parallelism: 4,
    };

    /// Deliberately slow tier for the tar-pit decoy (128 MiB).
    pub const TAR_PIT: Self = Self {
        time_cost: 4,
        memory_kib: 128 * 1024,
        parallelism: 2,
    };

    /// Channel handshake PAKE (16 MiB).
    pub const HANDSHAKE: Self = Self {
        time_cost: 2,
        memory_kib: 16 * 1024,
        parallelism: 2,
    };

    /// Smallest parameters argon2 accepts.
    pub const MINIMAL: Self = Self {
        time_cost: 1,
        memory_kib: 8,
        parallelism: 1,
    };
}

/// The set of cost tiers used by one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfProfile {
    pub standard: Argon2Cost,
    pub high: Argon2Cost,
    pub tar_pit: Argon2Cost,
    pub handshake: Argon2Cost,
}

impl Default for KdfProfile {
    fn default() -> Self {
        Self {
            standard: Argon2Cost::STANDARD,
            high: Argon2Cost::HIGH,
            tar_pit: Argon2Cost::TAR_PIT,
            handshake: Argon2Cost::HANDSHAKE,
        }
    }
}

impl KdfProfile {
    /// Minimal costs everywhere. Only for tests and benchmarks.
    pub fn insecure_fast() -> Self {
        Self {
            standard: Argon2Cost::MINIMAL,
            high: Argon2Cost::MINIMAL,
            tar_pit: Argon2Cost {
                time_cost: 2,
                ..Argon2Cost::MINIMAL
            },
            handshake: Argon2Cost::MINIMAL,
        }
    }
}

/// Hashes `password` with Argon2id into `out_len` bytes.
pub fn hash_password(
    password: &[u8],
    salt: &[u8],
    cost: Argon2Cost,
    out_len: usize,
) -> Result<Zeroizing<Vec<u8>>, KdfError> {
    let params = Params::new(
        cost.memory_kib,
        cost.time_cost,
        cost.parallelism,
        Some(out_len),
    )
    .map_err(|e| KdfError::PasswordHash(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut out = Zeroizing::new(vec![0u8; out_len]);
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| KdfError::PasswordHash(e.to_string()))?;
    Ok(out)
}

/// Hashes `password` into a 32-byte key.
pub fn hash_password_32(password: &[u8], salt: &[u8], cost: Argon2Cost) -> Result<[u8; 32], KdfError> {
    let out = hash_password(password, salt, cost, 32)?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&out);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: &[u8] = b"unit-test-salt-0123";

    #[test]
    fn test_deterministic() {
        let a = hash_password_32(b"hunter2", SALT, Argon2Cost::MINIMAL).unwrap();
        let b = hash_password_32(b"hunter2", SALT, Argon2Cost::MINIMAL).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_password_and_salt_matter() {
        let base = hash_password_32(b"hunter2", SALT, Argon2Cost::MINIMAL).unwrap();
        let other_pw = hash_password_32(b"hunter3", SALT, Argon2Cost::MINIMAL).unwrap();
        let other_salt = hash_password_32(b"hunter2", b"another-salt-456", Argon2Cost::MINIMAL).unwrap();
        assert_ne!(base, other_pw);
        assert_ne!(base, other_salt);
    }

    #[test]
    fn test_cost_changes_output() {
        let cheap = hash_password_32(b"pw", SALT, Argon2Cost::MINIMAL).unwrap();
        let slower = hash_password_32(
            b"pw",
            SALT,
            Argon2Cost {
                time_cost: 2,
                ..Argon2Cost::MINIMAL
            },
        )
        .unwrap();
        assert_ne!(cheap, slower);
    }

    #[test]
    fn test_variable_length_output() {
        let out = hash_password(b"pw", SALT, Argon2Cost::MINIMAL, 64).unwrap();
        assert_eq!(out.len(), 64);
    }

    #[test]
    fn test_short_salt_rejected() {
        let result = hash_password(b"pw", b"short", Argon2Cost::MINIMAL, 32);
        assert!(matches!(result, Err(KdfError::PasswordHash(_))));
    }

    #[test]
    fn test_default_profile_tiers() {
        let profile = KdfProfile::default();
        assert_eq!(profile.standard.memory_kib, 32 * 1024);
        assert_eq!(profile.high.time_cost, 3);
        assert!(profile.tar_pit.memory_kib > profile.high.memory_kib);
    }
}
