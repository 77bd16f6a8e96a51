//! Command module - Strategy pattern for CLI commands.
//!
//! Each command is a separate struct implementing the `CommandExecutor` trait.
//! Argument groups shared between commands live in `common`.

mod common;
mod decode;
mod derive;
mod encode;
mod image_stego;
mod keygen;
mod text_stego;
mod vault;

pub use decode::DecodeCommand;
pub use derive::DeriveCommand;
pub use encode::EncodeCommand;
pub use image_stego::{ArkOpenCommand, ArkSealCommand, EmbedImageCommand, ExtractImageCommand};
pub use keygen::KeygenCommand;
pub use text_stego::{EmbedTextCommand, ExtractTextCommand};
pub use vault::{VaultExportCommand, VaultImportCommand};

use anyhow::Result;

/// Trait for command execution - Strategy pattern.
///
/// Each command struct holds its parsed arguments and implements
/// this trait to define its execution logic.
pub trait CommandExecutor {
    /// Executes the command with its parsed arguments.
    fn execute(&self) -> Result<()>;
}
