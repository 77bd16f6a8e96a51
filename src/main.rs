//! Chimera - layered deniable encryption
//!
//! A CLI for hiding files among decoys, in text and image carriers, and in
//! carrier-bound images.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    ArkOpenCommand, ArkSealCommand, CommandExecutor, DecodeCommand, DeriveCommand, EmbedImageCommand,
    EmbedTextCommand, EncodeCommand, ExtractImageCommand, ExtractTextCommand, KeygenCommand, VaultExportCommand,
    VaultImportCommand,
};

/// Chimera - layered deniable encryption
///
/// Hides a file among decoy blobs so that only the right key reveals it,
/// with zero-width text, image and carrier-bound (ARK) carriers.
#[derive(Parser)]
#[command(name = "chimera")]
#[command(version)]
#[command(about = "Layered deniable encryption with steganographic carriers")]
#[command(long_about = None)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate random keys
    Keygen(KeygenCommand),

    /// Derive Alpha, Omega and Decoy keys from a master password
    Derive(DeriveCommand),

    /// Encode a message or file among decoys
    Encode(EncodeCommand),

    /// Decode a payload
    Decode(DecodeCommand),

    /// Hide data in text with zero-width characters
    EmbedText(EmbedTextCommand),

    /// Recover data hidden in text
    ExtractText(ExtractTextCommand),

    /// Hide data in image pixels
    EmbedImage(EmbedImageCommand),

    /// Recover data hidden in image pixels
    ExtractImage(ExtractImageCommand),

    /// Seal a file into an image bound to that exact carrier
    ArkSeal(ArkSealCommand),

    /// Open a carrier-bound image
    ArkOpen(ArkOpenCommand),

    /// Export keys and settings to a password-sealed vault
    VaultExport(VaultExportCommand),

    /// Import a vault and show its contents
    VaultImport(VaultImportCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Keygen(cmd) => cmd.execute(),
        Commands::Derive(cmd) => cmd.execute(),
        Commands::Encode(cmd) => cmd.execute(),
        Commands::Decode(cmd) => cmd.execute(),
        Commands::EmbedText(cmd) => cmd.execute(),
        Commands::ExtractText(cmd) => cmd.execute(),
        Commands::EmbedImage(cmd) => cmd.execute(),
        Commands::ExtractImage(cmd) => cmd.execute(),
        Commands::ArkSeal(cmd) => cmd.execute(),
        Commands::ArkOpen(cmd) => cmd.execute(),
        Commands::VaultExport(cmd) => cmd.execute(),
        Commands::VaultImport(cmd) => cmd.execute(),
    }
}
