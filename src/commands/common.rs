//! Argument groups and helpers shared by several commands.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};

use chimera::config::{EngineConfig, Preset, ProviderConfig};
use chimera::{KdfProfile, KeySource, OperationalKeys, VaultContents};

/// Where the keys come from: a master password or individual keys.
#[derive(Args, Debug, Clone)]
pub struct KeyArgs {
    /// Master password (derives Alpha, Omega and Decoy)
    #[arg(long, conflicts_with_all = ["alpha", "omega", "decoy"])]
    pub master: Option<String>,

    /// Alpha key or password (outer layer)
    #[arg(long)]
    pub alpha: Option<String>,

    /// Omega key or password (optional inner layer)
    #[arg(long, requires = "alpha")]
    pub omega: Option<String>,

    /// Decoy key or password (opens one decoy blob)
    #[arg(long, requires = "alpha")]
    pub decoy: Option<String>,

    /// Take the keys from a vault file
    #[arg(long, conflicts_with_all = ["master", "alpha"], requires = "vault_password")]
    pub vault: Option<PathBuf>,

    /// Password for --vault
    #[arg(long)]
    pub vault_password: Option<String>,
}

impl KeyArgs {
    pub fn source(&self) -> Result<KeySource> {
        if let Some(path) = &self.vault {
            let password = self.vault_password.as_deref().unwrap_or_default();
            let contents = VaultContents::import(path, password, &KdfProfile::default())
                .with_context(|| format!("Failed to open vault {}", path.display()))?;
            return contents.key_source().context("Vault holds no keys");
        }
        match (&self.master, &self.alpha) {
            (Some(master), _) => Ok(KeySource::Master(master.clone())),
            (None, Some(alpha)) => Ok(KeySource::Explicit {
                alpha: alpha.clone(),
                omega: self.omega.clone(),
                decoy: self.decoy.clone(),
            }),
            (None, None) => bail!("Provide --master, --alpha or --vault"),
        }
    }

    pub fn resolve(&self, profile: &KdfProfile) -> Result<OperationalKeys> {
        OperationalKeys::resolve(&self.source()?, profile).context("Failed to derive keys")
    }
}

/// Preset names accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum PresetArg {
    Standard,
    Paranoid,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Standard => Preset::Standard,
            PresetArg::Paranoid => Preset::Paranoid,
        }
    }
}

/// Engine settings: a TOML file, a preset, or the defaults.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Engine config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Apply a preset on top of the config
    #[arg(long, value_enum)]
    pub preset: Option<PresetArg>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(preset) = self.preset {
            config.apply_preset(preset.into());
        }
        Ok(config)
    }
}

/// Decoy provider settings.
#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// Decoy provider config file (TOML)
    #[arg(long)]
    pub provider_config: Option<PathBuf>,
}

impl ProviderArgs {
    pub fn load(&self) -> Result<ProviderConfig> {
        match &self.provider_config {
            Some(path) => ProviderConfig::load(path)
                .with_context(|| format!("Failed to load provider config {}", path.display())),
            None => Ok(ProviderConfig::default()),
        }
    }
}

/// Pipeline chosen by the engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// Real blob among decoys in a unified payload.
    Dust,
    /// Sealed into the given carrier image (`acoustic_resonance`).
    Carrier(&'a Path),
}

/// Picks the pipeline: `acoustic_resonance` needs `--carrier`, and
/// `--carrier` needs `acoustic_resonance`.
pub fn route<'a>(config: &EngineConfig, carrier: Option<&'a Path>) -> Result<Route<'a>> {
    match (config.acoustic_resonance, carrier) {
        (true, Some(path)) => Ok(Route::Carrier(path)),
        (true, None) => bail!("acoustic_resonance is enabled: pass the carrier image with --carrier"),
        (false, Some(_)) => bail!("--carrier requires acoustic_resonance (set it in --config or use --preset paranoid)"),
        (false, None) => Ok(Route::Dust),
    }
}

/// Refuses settings whose payloads could never be decoded.
pub fn ensure_decodable(config: &EngineConfig) -> Result<()> {
    if config.pq_hybrid {
        bail!(
            "pq_hybrid is an experimental placeholder: payloads encoded with it cannot be decoded. \
             Disable it in the config, or use --carrier with the paranoid preset"
        );
    }
    Ok(())
}

/// Reads the data to hide from `--message` or `--file`.
///
/// Returns the bytes plus the name and MIME type recorded in the payload.
pub fn read_input(message: Option<&str>, file: Option<&Path>) -> Result<(Vec<u8>, String, String)> {
    match (message, file) {
        (Some(message), None) => Ok((message.as_bytes().to_vec(), "message.txt".into(), "text/plain".into())),
        (None, Some(path)) => {
            let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".into());
            Ok((data, name, guess_mime_type(path).into()))
        }
        _ => bail!("Provide exactly one of --message or --file"),
    }
}

/// MIME type from the file extension.
pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Writes a recovered file to `output`, or prints it when it is UTF-8 text.
pub fn write_recovered(name: &str, data: &[u8], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Recovered '{}' ({} bytes) -> {}", name, data.len(), path.display());
        }
        None => match std::str::from_utf8(data) {
            Ok(text) => println!("{}", text),
            Err(_) => bail!("'{}' is binary data; use --output to save it", name),
        },
    }
    Ok(())
}

/// Builds a runtime for commands that drive the async pipelines.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create tokio runtime")
}
