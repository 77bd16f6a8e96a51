//! Zero-width text steganography commands.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use chimera::keys::normalize_key;
use chimera::stego::text;
use chimera::KdfProfile;

use super::common::{read_input, write_recovered};
use super::CommandExecutor;

/// Hide data in a text carrier using zero-width characters.
///
/// Each bit becomes an invisible character inserted at a key-dependent
/// position. The carrier needs at least one character per 8 bits plus one.
#[derive(Args, Debug)]
pub struct EmbedTextCommand {
    /// Carrier text file
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

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CommandExecutor for EmbedTextCommand {
    fn execute(&self) -> Result<()> {
        let carrier = fs::read_to_string(&self.carrier)
            .with_context(|| format!("Failed to read carrier {}", self.carrier.display()))?;
        let (data, _, _) = read_input(self.message.as_deref(), self.file.as_deref())?;
        let key = normalize_key(&self.key, &KdfProfile::default()).context("Invalid stego key")?;

        let stego = text::embed(&carrier, &data, key.as_bytes()).context("Embedding failed")?;

        match &self.output {
            Some(path) => {
                fs::write(path, &stego).with_context(|| format!("Failed to write {}", path.display()))?;
                eprintln!(
                    "Hid {} bytes in {} (capacity {} bytes)",
                    data.len(),
                    path.display(),
                    text::capacity(&carrier)
                );
            }
            None => print!("{}", stego),
        }
        Ok(())
    }
}

/// Recover data hidden with embed-text.
#[derive(Args, Debug)]
pub struct ExtractTextCommand {
    /// Text containing hidden data
    #[arg(short, long)]
    pub input: PathBuf,

    /// Stego key or password
    #[arg(short, long)]
    pub key: String,

    /// Output file for the recovered data
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CommandExecutor for ExtractTextCommand {
    fn execute(&self) -> Result<()> {
        let stego = fs::read_to_string(&self.input)
            .with_context(|| format!("Failed to read {}", self.input.display()))?;
        let key = normalize_key(&self.key, &KdfProfile::default()).context("Invalid stego key")?;

        let Some(data) = text::extract(&stego, key.as_bytes()) else {
            bail!("No hidden data found (wrong key or no payload)");
        };
        write_recovered("hidden data", &data, self.output.as_deref())
    }
}
