//! Decode command - recover a file from a unified payload.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use chimera::{Decoder, DecoderError, KdfProfile};

use super::common::{route, runtime, write_recovered, ConfigArgs, KeyArgs, Route};
use super::CommandExecutor;

/// Decode a unified payload.
///
/// The payload can be base64 text, raw payload bytes or an armored PNG. The
/// engine settings must match those used for encoding, otherwise no blob
/// decrypts and the decoherence report is shown. With acoustic_resonance
/// enabled, --input is the sealed image and --carrier the original carrier.
#[derive(Args, Debug)]
pub struct DecodeCommand {
    /// Payload as base64 text
    #[arg(long, conflicts_with = "input")]
    pub code: Option<String>,

    /// Payload file (text, binary or armored PNG)
    #[arg(short, long, conflicts_with = "code")]
    pub input: Option<PathBuf>,

    #[command(flatten)]
    pub keys: KeyArgs,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output file for the recovered data
    /// If not specified, text is printed to stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the per-blob decoherence report
    #[arg(long)]
    pub report: bool,

    /// Original carrier image for acoustic_resonance (requires --input)
    #[arg(long, requires = "input")]
    pub carrier: Option<PathBuf>,
}

impl CommandExecutor for DecodeCommand {
    fn execute(&self) -> Result<()> {
        let input = match (&self.code, &self.input) {
            (Some(code), None) => code.trim().as_bytes().to_vec(),
            (None, Some(path)) => fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?,
            _ => bail!("Provide exactly one of --code or --input"),
        };

        let profile = KdfProfile::default();
        let config = self.config.load()?;
        let route = route(&config, self.carrier.as_deref())?;
        let keys = self.keys.resolve(&profile)?;

        let decoder = Decoder::new(config);
        if let Route::Carrier(carrier_path) = route {
            let carrier = fs::read(carrier_path)
                .with_context(|| format!("Failed to read carrier {}", carrier_path.display()))?;
            let file = decoder
                .decode_from_carrier(&carrier, &input, &keys)
                .context("Carrier-bound decoding failed (wrong key, wrong carrier, or no payload)")?;
            return write_recovered(&file.name, &file.data, self.output.as_deref());
        }

        match runtime()?.block_on(decoder.decode(&input, &keys)) {
            Ok(outcome) => {
                if self.report {
                    eprintln!("Decoherence report:");
                    eprint!("{}", outcome.report);
                }
                write_recovered(&outcome.file.name, &outcome.file.data, self.output.as_deref())
            }
            Err(DecoderError::DecoherenceFailure { report }) => {
                if self.report {
                    eprintln!("Decoherence report:");
                    eprint!("{}", report);
                }
                // A decoy opened: show it like any other message
                match report.blobs.iter().find_map(|b| b.decoy_text.as_deref()) {
                    Some(text) => {
                        println!("{}", text);
                        Ok(())
                    }
                    None => bail!("Decoherence failure: keys incorrect or data corrupt"),
                }
            }
            Err(e) => Err(e).context("Decoding failed"),
        }
    }
}
