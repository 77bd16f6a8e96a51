//! Steganographic carriers.
//!
//! Supports:
//! - Zero-width character embedding in text
//! - Entropic dispersal in image pixels (PNG, BMP)
//! - Carrier-bound keying for image payloads (ARK)

pub mod ark;
pub mod image;
pub mod text;

pub use self::image::{scrub_to_png, ImageStego, ImageStegoError};
pub use ark::ArkError;
pub use text::{StegoAlphabet, TextStegoError};
