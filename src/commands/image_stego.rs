//! Image steganography commands, plain and carrier-bound (ARK).

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use chimera::keys::normalize_key;
use chimera::stego::{ark, ImageStego};
use chimera::KdfProfile;

use super::common::{read_input, write_recovered, ConfigArgs, KeyArgs};
use super::CommandExecutor;

/// Hide data in the pixels of a PNG or BMP image.
///
/// Bits are dispersed over a keyed shuffle of the RGB channel bytes and every
/// unused low bit is overwritten with keyed noise. Output is always PNG.
#[derive(Args, Debug)]
pub struct EmbedImageCommand {
    /// Carrier image (PNG, BMP)
    #[arg(short, long)]
    pub carrier: PathBuf,

    /// Text message to hide (mutually exclusive with --file)
    #[arg(short, long, conflicts_with = "file")]
    pub message: Option<String>,

    /// File to hide, e.g. an encoded payload (mutually exclusive with --message)
    #[arg(short, long, conflicts_with = "message")]
    pub file: Option<PathBuf>,

    /// Stego key or password
    #[arg(short, long)]
    pub key: String,

    /// Output PNG path
    #[arg(short, long)]
    pub output: PathBuf,
}

impl CommandExecutor for EmbedImageCommand {
    fn execute(&self) -> Result<()> {
        let stego = ImageStego::from_file(&self.carrier)
            .with_context(|| format!("Failed to load carrier {}", self.carrier.display()))?;
        let (data, _, _) = read_input(self.message.as_deref(), self.file.as_deref())?;
        let key = normalize_key(&self.key, &KdfProfile::default()).context("Invalid stego key")?;

        let image = ImageStego::from_image(stego.embed(&data, key.as_bytes()).context("Embedding failed")?);
        let png = image.to_png_bytes()?;
        fs::write(&self.output, png).with_context(|| format!("Failed to write {}", self.output.display()))?;

        eprintln!(
            "Hid {} bytes in {} (capacity {} bytes)",
            data.len(),
            self.output.display(),
            stego.capacity()
        );
        Ok(())
    }
}

/// Recover data hidden with embed-image.
#[derive(Args, Debug)]
pub struct ExtractImageCommand {
    /// Image containing hidden data
    #[arg(short, long)]
    pub input: PathBuf,

    /// Stego key or password
    #[arg(short, long)]
    pub key: String,

    /// Output file for the recovered data
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CommandExecutor for ExtractImageCommand {
    fn execute(&self) -> Result<()> {
        let stego = ImageStego::from_file(&self.input)
            .with_context(|| format!("Failed to load {}", self.input.display()))?;
        let key = normalize_key(&self.key, &KdfProfile::default()).context("Invalid stego key")?;

        let Some(data) = stego.extract(key.as_bytes()) else {
            bail!("No hidden data found (wrong key or no payload)");
        };
        write_recovered("hidden data", &data, self.output.as_deref())
    }
}

/// Seal a file into an image bound to that exact carrier (ARK).
///
/// Opening requires the Alpha key AND the bit-exact original carrier file.
/// Keep the original; any re-encoding of it makes the payload unrecoverable.
#[derive(Args, Debug)]
pub struct ArkSealCommand {
    /// Original carrier image (PNG, BMP); keep this file unchanged
    #[arg(short, long)]
    pub carrier: PathBuf,

    /// Text message to hide (mutually exclusive with --file)
    #[arg(short, long, conflicts_with = "file")]
    pub message: Option<String>,

    /// File to hide (mutually exclusive with --message)
    #[arg(short, long, conflicts_with = "message")]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub keys: KeyArgs,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output PNG path
    #[arg(short, long)]
    pub output: PathBuf,
}

impl CommandExecutor for ArkSealCommand {
    fn execute(&self) -> Result<()> {
        let carrier = fs::read(&self.carrier)
            .with_context(|| format!("Failed to read carrier {}", self.carrier.display()))?;
        let (data, name, mime_type) = read_input(self.message.as_deref(), self.file.as_deref())?;
        let config = self.config.load()?;
        let keys = self.keys.resolve(&KdfProfile::default())?;

        let png = ark::seal(&carrier, &data, &name, &mime_type, &keys.alpha, config.compression)
            .context("ARK sealing failed")?;
        fs::write(&self.output, png).with_context(|| format!("Failed to write {}", self.output.display()))?;

        eprintln!("Sealed '{}' into {} (bound to {})", name, self.output.display(), self.carrier.display());
        Ok(())
    }
}

/// Open an image sealed with ark-seal.
#[derive(Args, Debug)]
pub struct ArkOpenCommand {
    /// The original carrier image used for sealing
    #[arg(short, long)]
    pub carrier: PathBuf,

    /// The sealed image
    #[arg(short, long)]
    pub input: PathBuf,

    #[command(flatten)]
    pub keys: KeyArgs,

    /// Output file for the recovered data
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CommandExecutor for ArkOpenCommand {
    fn execute(&self) -> Result<()> {
        let carrier = fs::read(&self.carrier)
            .with_context(|| format!("Failed to read carrier {}", self.carrier.display()))?;
        let sealed = fs::read(&self.input).with_context(|| format!("Failed to read {}", self.input.display()))?;
        let keys = self.keys.resolve(&KdfProfile::default())?;

        let file = ark::open(&carrier, &sealed, &keys.alpha)
            .context("ARK open failed (wrong key, wrong carrier, or no payload)")?;
        write_recovered(&file.name, &file.data, self.output.as_deref())
    }
}
