//! Master-key derivation command.

use anyhow::{Context, Result};
use clap::Args;

use chimera::keys::{derive_master_keys, MasterKeys};
use chimera::KdfProfile;

use super::CommandExecutor;

/// Derive the Alpha, Omega and Decoy keys from a master password.
///
/// The derived keys can be shared individually, e.g. handing only the Decoy
/// key to someone who must not see the real payload.
#[derive(Args, Debug)]
pub struct DeriveCommand {
    /// Master password
    #[arg(short, long)]
    pub master: String,
}

impl CommandExecutor for DeriveCommand {
    fn execute(&self) -> Result<()> {
        let MasterKeys { alpha, omega, decoy } =
            derive_master_keys(&self.master, &KdfProfile::default()).context("Failed to derive keys")?;

        println!("Alpha: {}", alpha.to_base64());
        println!("Omega: {}", omega.to_base64());
        println!("Decoy: {}", decoy.to_base64());

        Ok(())
    }
}
