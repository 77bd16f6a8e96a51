//! Key vault export and import commands.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use chimera::{ExplicitKeys, KdfProfile, VaultContents};

use super::common::{ConfigArgs, KeyArgs};
use super::CommandExecutor;

/// Export keys and engine settings to a password-sealed vault file.
#[derive(Args, Debug)]
pub struct VaultExportCommand {
    #[command(flatten)]
    pub keys: KeyArgs,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Vault password
    #[arg(short, long)]
    pub password: String,

    /// Output vault file
    #[arg(short, long, default_value = "chimera.vault")]
    pub output: PathBuf,
}

impl CommandExecutor for VaultExportCommand {
    fn execute(&self) -> Result<()> {
        if self.keys.master.is_none() && self.keys.alpha.is_none() {
            bail!("Nothing to export: provide --master or --alpha");
        }

        let contents = VaultContents {
            master_key: self.keys.master.clone(),
            keys: ExplicitKeys {
                alpha: self.keys.alpha.clone(),
                omega: self.keys.omega.clone(),
                decoy: self.keys.decoy.clone(),
            },
            config: self.config.load()?,
        };

        contents
            .export(&self.output, &self.password, &KdfProfile::default())
            .with_context(|| format!("Failed to export vault to {}", self.output.display()))?;

        println!("Vault written to {}", self.output.display());
        println!("Keep the vault password safe; it cannot be recovered.");
        Ok(())
    }
}

/// Import a vault file and show what it holds.
#[derive(Args, Debug)]
pub struct VaultImportCommand {
    /// Vault file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Vault password
    #[arg(short, long)]
    pub password: String,

    /// Print the stored keys (otherwise only their presence is shown)
    #[arg(long)]
    pub show_keys: bool,

    /// Save the stored engine settings to this TOML file
    #[arg(long)]
    pub write_config: Option<PathBuf>,
}

impl CommandExecutor for VaultImportCommand {
    fn execute(&self) -> Result<()> {
        let contents = VaultContents::import(&self.input, &self.password, &KdfProfile::default())
            .with_context(|| format!("Failed to open vault {}", self.input.display()))?;

        println!("Vault: {}", self.input.display());
        print_entry("Master key", contents.master_key.as_deref(), self.show_keys);
        print_entry("Alpha", contents.keys.alpha.as_deref(), self.show_keys);
        print_entry("Omega", contents.keys.omega.as_deref(), self.show_keys);
        print_entry("Decoy", contents.keys.decoy.as_deref(), self.show_keys);
        println!("Preset: {:?}", contents.config.preset);

        if let Some(path) = &self.write_config {
            contents
                .config
                .save(path)
                .with_context(|| format!("Failed to write config {}", path.display()))?;
            println!("Engine settings saved to {}", path.display());
        }
        Ok(())
    }
}

fn print_entry(label: &str, value: Option<&str>, show: bool) {
    match value {
        Some(v) if show => println!("  {:<11} {}", label, v),
        Some(_) => println!("  {:<11} (stored)", label),
        None => println!("  {:<11} -", label),
    }
}
