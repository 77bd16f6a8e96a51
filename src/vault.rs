//! Encrypted key vault.
//!
//! File layout: `[16-byte salt][nonce || AEAD(json) || tag]`. The AEAD key is
//! Argon2id (high cost) of the vault password with the file's salt.

use std::fs;
use std::path::Path;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::config::EngineConfig;
use crate::crypto::{aead_decrypt, aead_encrypt, hash_password_32, KdfError, KdfProfile, SymmetricError};
use crate::keys::KeySource;

/// Salt length at the head of a vault file.
pub const VAULT_SALT_LEN: usize = 16;

/// Errors that can occur reading or writing a vault.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Vault password is empty")]
    EmptyPassword,

    #[error("Vault file too short")]
    Truncated,

    #[error("Wrong vault password or corrupted vault")]
    AuthenticationFailure,

    #[error("Encryption error: {0}")]
    Symmetric(SymmetricError),

    #[error("Key derivation error: {0}")]
    Kdf(#[from] KdfError),

    #[error("Invalid vault contents: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SymmetricError> for VaultError {
    fn from(e: SymmetricError) -> Self {
        match e {
            SymmetricError::AuthenticationFailure | SymmetricError::CiphertextTooShort => {
                VaultError::AuthenticationFailure
            }
            other => VaultError::Symmetric(other),
        }
    }
}

/// Individually stored keys or passwords.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[serde(default)]
pub struct ExplicitKeys {
    pub alpha: Option<String>,
    pub omega: Option<String>,
    pub decoy: Option<String>,
}

/// Everything a vault holds.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultContents {
    #[serde(default)]
    pub master_key: Option<String>,
    #[serde(default)]
    pub keys: ExplicitKeys,
    #[serde(default)]
    pub config: EngineConfig,
}

impl std::fmt::Debug for VaultContents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultContents")
            .field("master_key", &self.master_key.is_some())
            .field("alpha", &self.keys.alpha.is_some())
            .field("omega", &self.keys.omega.is_some())
            .field("decoy", &self.keys.decoy.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for VaultContents {
    fn drop(&mut self) {
        self.master_key.zeroize();
        self.keys.zeroize();
    }
}

impl VaultContents {
    /// The key source these contents describe: the master key if present,
    /// otherwise the explicit Alpha key with optional Omega and Decoy.
    pub fn key_source(&self) -> Option<KeySource> {
        if let Some(master) = self.master_key.as_ref().filter(|m| !m.is_empty()) {
            return Some(KeySource::Master(master.clone()));
        }
        let alpha = self.keys.alpha.as_ref().filter(|a| !a.is_empty())?;
        Some(KeySource::Explicit {
            alpha: alpha.clone(),
            omega: self.keys.omega.clone(),
            decoy: self.keys.decoy.clone(),
        })
    }

    /// Seals the contents under `password`.
    pub fn seal(&self, password: &str, profile: &KdfProfile) -> Result<Vec<u8>, VaultError> {
        if password.is_empty() {
            return Err(VaultError::EmptyPassword);
        }
        let mut salt = [0u8; VAULT_SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let key = Zeroizing::new(hash_password_32(password.as_bytes(), &salt, profile.high)?);
        let json = Zeroizing::new(serde_json::to_vec(self)?);
        let sealed = aead_encrypt(&key, &json, None)?;

        let mut out = Vec::with_capacity(VAULT_SALT_LEN + sealed.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Opens sealed vault bytes.
    pub fn open(bytes: &[u8], password: &str, profile: &KdfProfile) -> Result<Self, VaultError> {
        if password.is_empty() {
            return Err(VaultError::EmptyPassword);
        }
        if bytes.len() < VAULT_SALT_LEN {
            return Err(VaultError::Truncated);
        }
        let (salt, sealed) = bytes.split_at(VAULT_SALT_LEN);

        let key = Zeroizing::new(hash_password_32(password.as_bytes(), salt, profile.high)?);
        let json = Zeroizing::new(aead_decrypt(&key, sealed, None)?);
        Ok(serde_json::from_slice(&json)?)
    }

    /// Writes a sealed vault file.
    pub fn export(&self, path: &Path, password: &str, profile: &KdfProfile) -> Result<(), VaultError> {
        fs::write(path, self.seal(password, profile)?)?;
        debug!(path = %path.display(), "vault exported");
        Ok(())
    }

    /// Reads a sealed vault file.
    pub fn import(path: &Path, password: &str, profile: &KdfProfile) -> Result<Self, VaultError> {
        let bytes = fs::read(path)?;
        let contents = Self::open(&bytes, password, profile)?;
        debug!(path = %path.display(), "vault imported");
        Ok(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, Preset};

    fn contents() -> VaultContents {
        VaultContents {
            master_key: None,
            keys: ExplicitKeys {
                alpha: Some("alpha pass".into()),
                omega: None,
                decoy: Some("decoy pass".into()),
            },
            config: EngineConfig::from_preset(Preset::Paranoid),
        }
    }

    #[test]
    fn test_seal_and_open() {
        let profile = KdfProfile::insecure_fast();
        let sealed = contents().seal("vault pw", &profile).unwrap();
        assert_eq!(VaultContents::open(&sealed, "vault pw", &profile).unwrap(), contents());
    }

    #[test]
    fn test_layout_and_fresh_salt() {
        let profile = KdfProfile::insecure_fast();
        let a = contents().seal("vault pw", &profile).unwrap();
        let b = contents().seal("vault pw", &profile).unwrap();
        assert_ne!(a[..VAULT_SALT_LEN], b[..VAULT_SALT_LEN]);
        assert!(a.len() > VAULT_SALT_LEN + 28);
    }

    #[test]
    fn test_wrong_password() {
        let profile = KdfProfile::insecure_fast();
        let sealed = contents().seal("vault pw", &profile).unwrap();
        assert!(matches!(
            VaultContents::open(&sealed, "other", &profile),
            Err(VaultError::AuthenticationFailure)
        ));
        assert!(matches!(
            VaultContents::open(&sealed[..10], "vault pw", &profile),
            Err(VaultError::Truncated)
        ));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.vault");
        let profile = KdfProfile::insecure_fast();

        contents().export(&path, "vault pw", &profile).unwrap();
        let imported = VaultContents::import(&path, "vault pw", &profile).unwrap();
        assert_eq!(imported.config.preset, Preset::Paranoid);
    }

    #[test]
    fn test_key_source_prefers_master() {
        let mut c = contents();
        assert!(matches!(c.key_source(), Some(KeySource::Explicit { .. })));
        c.master_key = Some("master".into());
        assert!(matches!(c.key_source(), Some(KeySource::Master(_))));
        assert!(VaultContents::default().key_source().is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let parsed: VaultContents = serde_json::from_str(r#"{"master_key":"master"}"#).unwrap();
        assert_eq!(parsed.master_key.as_deref(), Some("master"));
        assert_eq!(parsed.keys, ExplicitKeys::default());
        assert_eq!(parsed.config, EngineConfig::default());
    }

    #[test]
    fn test_debug_hides_secrets() {
        assert!(!format!("{:?}", contents()).contains("alpha pass"));
    }
}
