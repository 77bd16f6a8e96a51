//! Engine configuration.
//!
//! All feature flags for the encode/decode pipelines live in one tagged
//! struct. The same struct is stored in key vaults and can be loaded from a
//! TOML file by the CLI.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::crypto::{Argon2Cost, KdfProfile};
use crate::keys::HardeningFlags;

/// Default maximum number of cached skipped message keys per channel.
pub const DEFAULT_MAX_SKIPPED_KEYS: usize = 1000;

/// Default maximum forward jump within one receiving chain.
pub const DEFAULT_MAX_SKIP_PER_CHAIN: u32 = 1000;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// How many decoy blobs accompany the real one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeniabilityLevel {
    Minimal,
    Standard,
    #[default]
    Hardened,
}

impl DeniabilityLevel {
    pub fn decoy_count(self) -> usize {
        match self {
            DeniabilityLevel::Minimal => 0,
            DeniabilityLevel::Standard => 1,
            DeniabilityLevel::Hardened => 3,
        }
    }

    /// Only the hardened level plants a tar-pit decoy.
    pub fn uses_tar_pit(self) -> bool {
        self == DeniabilityLevel::Hardened
    }
}

/// Serialization of the unified payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Binary,
    Json,
}

/// Named bundles of settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Custom,
    Standard,
    Paranoid,
}

/// Feature flags for the encode/decode pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Re-encode image files as PNG before encryption, dropping metadata.
    pub scrubber: bool,
    /// Deflate the file when that makes it smaller.
    pub compression: bool,
    /// Keyed byte permutation of the real blob.
    pub block_permutation: bool,
    /// Bind the active flags into the Alpha and Omega keys.
    pub key_hardening: bool,
    /// Placeholder hybrid combination. Does not round-trip.
    pub pq_hybrid: bool,
    /// Seal into a carrier image under the carrier-bound key instead of
    /// scattering among decoys.
    pub acoustic_resonance: bool,
    pub deniability_level: DeniabilityLevel,
    pub payload_format: PayloadFormat,
    /// Ask the decoy provider for fresh decoy texts.
    pub dynamic_decoys: bool,
    pub preset: Preset,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scrubber: true,
            compression: true,
            block_permutation: false,
            key_hardening: true,
            pq_hybrid: false,
            acoustic_resonance: false,
            deniability_level: DeniabilityLevel::Hardened,
            payload_format: PayloadFormat::Binary,
            dynamic_decoys: true,
            preset: Preset::Custom,
        }
    }
}

impl EngineConfig {
    /// Builds the config for a preset. `Custom` yields the defaults.
    pub fn from_preset(preset: Preset) -> Self {
        let mut config = Self::default();
        config.apply_preset(preset);
        config
    }

    /// Overwrites the flags a preset controls.
    pub fn apply_preset(&mut self, preset: Preset) {
        self.preset = preset;
        match preset {
            Preset::Custom => {}
            Preset::Standard => {
                self.key_hardening = true;
                self.block_permutation = false;
                self.pq_hybrid = false;
                self.acoustic_resonance = false;
                self.deniability_level = DeniabilityLevel::Standard;
                self.dynamic_decoys = true;
                self.compression = true;
                self.scrubber = true;
            }
            Preset::Paranoid => {
                self.key_hardening = true;
                self.block_permutation = true;
                self.pq_hybrid = true;
                self.acoustic_resonance = true;
                self.deniability_level = DeniabilityLevel::Hardened;
                self.dynamic_decoys = true;
                self.compression = true;
                self.scrubber = true;
            }
        }
    }

    /// Flags bound into hardened keys.
    pub fn hardening_flags(&self) -> HardeningFlags {
        HardeningFlags {
            block_permutation: self.block_permutation,
            pq_hybrid: self.pq_hybrid,
        }
    }

    /// Loads a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves the config as TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Which content service produces decoy texts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// No service; always use the built-in texts.
    #[default]
    Offline,
    /// Hosted generation API.
    Hosted,
    /// Self-hosted endpoint.
    Local,
}

/// Where an API key for the provider is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStorage {
    #[default]
    Session,
    Local,
}

/// Endpoints for a content provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    pub text_generation: Option<String>,
    pub image_generation: Option<String>,
}

/// Settings handed to the decoy-content collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub endpoints: ProviderEndpoints,
    pub api_key_storage: ApiKeyStorage,
}

impl ProviderConfig {
    /// Loads provider settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Channel settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Total skipped message keys kept before the oldest are evicted.
    pub max_skipped_keys: usize,
    /// Largest gap accepted within a single receiving chain.
    pub max_skip_per_chain: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_skipped_keys: DEFAULT_MAX_SKIPPED_KEYS,
            max_skip_per_chain: DEFAULT_MAX_SKIP_PER_CHAIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.scrubber);
        assert!(config.compression);
        assert!(!config.block_permutation);
        assert!(config.key_hardening);
        assert!(!config.pq_hybrid);
        assert_eq!(config.deniability_level, DeniabilityLevel::Hardened);
        assert_eq!(config.payload_format, PayloadFormat::Binary);
    }

    #[test]
    fn test_decoy_counts() {
        assert_eq!(DeniabilityLevel::Minimal.decoy_count(), 0);
        assert_eq!(DeniabilityLevel::Standard.decoy_count(), 1);
        assert_eq!(DeniabilityLevel::Hardened.decoy_count(), 3);
    }

    #[test]
    fn test_paranoid_preset() {
        let config = EngineConfig::from_preset(Preset::Paranoid);
        assert!(config.block_permutation);
        assert!(config.pq_hybrid);
        assert!(config.acoustic_resonance);
        assert_eq!(config.hardening_flags().config_byte(), 3);
    }

    #[test]
    fn test_standard_preset() {
        let config = EngineConfig::from_preset(Preset::Standard);
        assert!(!config.block_permutation);
        assert_eq!(config.deniability_level, DeniabilityLevel::Standard);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            block_permutation = true
            deniability_level = "minimal"
            "#,
        )
        .unwrap();
        assert!(config.block_permutation);
        assert_eq!(config.deniability_level, DeniabilityLevel::Minimal);
        assert!(config.compression);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chimera.toml");

        let config = EngineConfig::from_preset(Preset::Paranoid);
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_channel_config_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.max_skipped_keys, 1000);
    }

    #[test]
    fn test_provider_config_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provider.toml");
        fs::write(
            &path,
            r#"
            provider = "local"
            api_key_storage = "local"

            [endpoints]
            text_generation = "http://127.0.0.1:8080/generate"
            "#,
        )
        .unwrap();

        let config = ProviderConfig::load(&path).unwrap();
        assert_eq!(config.provider, ProviderKind::Local);
        assert_eq!(config.api_key_storage, ApiKeyStorage::Local);
        assert!(config.endpoints.image_generation.is_none());
    }
}
