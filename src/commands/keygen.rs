//! Key generation command.

use anyhow::Result;
use clap::Args;

use chimera::{generate_channel_id, generate_key};

use super::CommandExecutor;

/// Generate random keys (base64, 32 bytes).
#[derive(Args, Debug)]
pub struct KeygenCommand {
    /// Number of keys to generate
    #[arg(short = 'n', long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=16))]
    pub count: u8,

    /// Also generate a channel identifier
    #[arg(long)]
    pub channel_id: bool,
}

impl CommandExecutor for KeygenCommand {
    fn execute(&self) -> Result<()> {
        for _ in 0..self.count {
            println!("{}", generate_key());
        }

        if self.channel_id {
            println!();
            println!("Channel ID: {}", generate_channel_id());
        }

        Ok(())
    }
}
