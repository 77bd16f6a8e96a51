//! Encode command - hide a message or file in digital dust.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use chimera::dust::ConfiguredDecoyProvider;
use chimera::{Encoder, FileInput, KdfProfile};

use super::common::{ensure_decodable, read_input, route, runtime, ConfigArgs, KeyArgs, ProviderArgs, Route};
use super::CommandExecutor;

/// Encode a message or file into a unified payload.
///
/// The real payload is sealed among decoy blobs and the whole set is veiled.
/// Without --output the payload is printed as base64 text. With
/// acoustic_resonance enabled the file is sealed into --carrier instead.
#[derive(Args, Debug)]
pub struct EncodeCommand {
    /// Text message to encode (mutually exclusive with --file)
    #[arg(short, long, conflicts_with = "file")]
    pub message: Option<String>,

    /// File to encode (mutually exclusive with --message)
    #[arg(short, long, conflicts_with = "message")]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub keys: KeyArgs,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Write the payload to this file instead of printing it
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Wrap the payload in a PNG image (requires --output)
    #[arg(long, requires = "output")]
    pub armor: bool,

    /// Carrier image for acoustic_resonance (requires --output)
    #[arg(long, requires = "output", conflicts_with = "armor")]
    pub carrier: Option<PathBuf>,
}

impl CommandExecutor for EncodeCommand {
    fn execute(&self) -> Result<()> {
        let (data, name, mime_type) = read_input(self.message.as_deref(), self.file.as_deref())?;
        if data.is_empty() {
            bail!("Nothing to encode: input is empty");
        }

        let profile = KdfProfile::default();
        let config = self.config.load()?;
        let provider = Arc::new(ConfiguredDecoyProvider::new(self.provider.load()?));
        let route = route(&config, self.carrier.as_deref())?;
        if route == Route::Dust {
            ensure_decodable(&config)?;
        }
        let keys = self.keys.resolve(&profile)?;

        let encoder = Encoder::new(config).with_profile(profile).with_provider(provider);
        let file = FileInput {
            data: &data,
            name: &name,
            mime_type: &mime_type,
        };

        if let Route::Carrier(carrier_path) = route {
            let output = self.output.as_deref().context("--carrier requires --output")?;
            let carrier = fs::read(carrier_path)
                .with_context(|| format!("Failed to read carrier {}", carrier_path.display()))?;
            let png = encoder
                .encode_to_carrier(file, &carrier, &keys)
                .context("Carrier-bound encoding failed")?;
            fs::write(output, &png).with_context(|| format!("Failed to write {}", output.display()))?;
            eprintln!(
                "Sealed '{}' into {} (bound to {})",
                name,
                output.display(),
                carrier_path.display()
            );
            return Ok(());
        }

        let encoded = runtime()?
            .block_on(encoder.encode(file, &keys))
            .context("Encoding failed")?;

        match &self.output {
            Some(path) => {
                let bytes = if self.armor {
                    encoded.to_armored_png()?
                } else {
                    encoded.to_bytes()?
                };
                fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
                eprintln!(
                    "Encoded '{}' into {} blobs -> {} ({} bytes)",
                    name,
                    encoded.blob_count(),
                    path.display(),
                    bytes.len()
                );
            }
            None => {
                println!("{}", encoded.to_text()?);
                eprintln!("Encoded '{}' into {} blobs", name, encoded.blob_count());
            }
        }

        Ok(())
    }
}
