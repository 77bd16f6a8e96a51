//! Entropic dispersal: keyed LSB steganography for images.
//!
//! Bits are written into the least significant bit of the R, G and B
//! channels (never alpha). The key drives a shuffle of every channel byte;
//! a 32-bit length header and then the data bits take the first slots of
//! that order. Every remaining slot is overwritten with keystream noise, so
//! the LSB plane carries no boundary between used and unused capacity.
//!
//! Format: `[u32 BE payload length in bits][payload bits, MSB first]`
//!
//! Only lossless formats survive (PNG, BMP).

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::crypto::{CryptoPrng, KdfError};

/// PRNG salt for the channel-byte shuffle.
const DISPERSAL_SALT: &[u8] = b"entropic-dispersal-stego-salt";

/// Bits in the length header.
const HEADER_BITS: usize = 32;

/// Errors that can occur during image steganography.
#[derive(Error, Debug)]
pub enum ImageStegoError {
    #[error("Carrier capacity exceeded: need {needed} bits, image has {capacity}")]
    CarrierCapacityExceeded { needed: usize, capacity: usize },

    #[error("Image load error: {0}")]
    ImageLoad(String),

    #[error("Image save error: {0}")]
    ImageSave(String),

    #[error("Key derivation error: {0}")]
    Kdf(#[from] KdfError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Image steganography handler.
pub struct ImageStego {
    image: DynamicImage,
}

impl ImageStego {
    /// Creates a new ImageStego from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ImageStegoError> {
        let image = image::open(path).map_err(|e| ImageStegoError::ImageLoad(e.to_string()))?;
        Ok(Self { image })
    }

    /// Creates a new ImageStego from encoded image bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageStegoError> {
        let image = image::load_from_memory(bytes).map_err(|e| ImageStegoError::ImageLoad(e.to_string()))?;
        Ok(Self { image })
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Number of usable channel bytes (R, G, B of every pixel).
    pub fn slot_count(&self) -> usize {
        let (width, height) = self.image.dimensions();
        (width as usize) * (height as usize) * 3
    }

    /// Bytes that can be hidden, after the length header.
    pub fn capacity(&self) -> usize {
        self.slot_count().saturating_sub(HEADER_BITS) / 8
    }

    /// Hides `data` and returns the new image.
    pub fn embed(&self, data: &[u8], key: &[u8]) -> Result<DynamicImage, ImageStegoError> {
        let slot_count = self.slot_count();
        let data_bits = data.len() * 8;
        let needed = HEADER_BITS + data_bits;
        let bit_len = u32::try_from(data_bits).ok().filter(|_| needed <= slot_count).ok_or(
            ImageStegoError::CarrierCapacityExceeded {
                needed,
                capacity: slot_count,
            },
        )?;

        let mut prng = CryptoPrng::from_key(key, DISPERSAL_SALT)?;
        let order = prng.permutation(slot_count);

        let mut rgba = self.image.to_rgba8();
        let buffer: &mut [u8] = &mut rgba;

        let header = bit_len.to_be_bytes();
        let bits = header
            .iter()
            .chain(data)
            .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1));

        let mut used = 0;
        for (slot, bit) in order.iter().zip(bits) {
            let index = channel_index(*slot);
            buffer[index] = (buffer[index] & 0xFE) | bit;
            used += 1;
        }

        // Noise fill: the rest of the LSB plane becomes keystream.
        for slot in &order[used..] {
            let index = channel_index(*slot);
            let noise = (prng.next_f64() * 2.0) as u8 & 1;
            buffer[index] = (buffer[index] & 0xFE) | noise;
        }

        debug!(
            bytes = data.len(),
            used_slots = used,
            total_slots = slot_count,
            "dispersed data into image"
        );

        Ok(DynamicImage::ImageRgba8(rgba))
    }

    /// Extracts data hidden with the same key.
    ///
    /// Returns `None` when the header is implausible for this image, which is
    /// what a wrong key or a clean image looks like.
    pub fn extract(&self, key: &[u8]) -> Option<Vec<u8>> {
        let slot_count = self.slot_count();
        if slot_count < HEADER_BITS {
            return None;
        }

        let order = CryptoPrng::from_key(key, DISPERSAL_SALT).ok()?.permutation(slot_count);
        let rgba = self.image.to_rgba8();
        let buffer: &[u8] = &rgba;
        let bit_at = |slot: usize| buffer[channel_index(order[slot])] & 1;

        let bit_len = (0..HEADER_BITS).fold(0usize, |acc, slot| (acc << 1) | usize::from(bit_at(slot)));
        if bit_len > slot_count - HEADER_BITS || bit_len % 8 != 0 {
            return None;
        }

        let data = (0..bit_len / 8)
            .map(|byte| {
                (0..8).fold(0u8, |acc, bit| (acc << 1) | bit_at(HEADER_BITS + byte * 8 + bit))
            })
            .collect();
        Some(data)
    }

    /// Saves the image to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ImageStegoError> {
        self.image
            .save(path)
            .map_err(|e| ImageStegoError::ImageSave(e.to_string()))
    }

    /// Returns the image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, ImageStegoError> {
        encode_png(&self.image)
    }

    /// Returns a reference to the underlying image.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Consumes self and returns the underlying image.
    pub fn into_image(self) -> DynamicImage {
        self.image
    }
}

/// Maps a slot to its byte in the RGBA buffer, skipping alpha.
fn channel_index(slot: usize) -> usize {
    (slot / 3) * 4 + slot % 3
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ImageStegoError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| ImageStegoError::ImageSave(e.to_string()))?;
    Ok(bytes)
}

/// Re-encodes an image as PNG, dropping EXIF and every other metadata chunk.
pub fn scrub_to_png(bytes: &[u8]) -> Result<Vec<u8>, ImageStegoError> {
    let image = image::load_from_memory(bytes).map_err(|e| ImageStegoError::ImageLoad(e.to_string()))?;
    encode_png(&image)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    const KEY: &[u8] = &[42u8; 32];

    pub(crate) fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 17) % 256) as u8,
                ((y * 23) % 256) as u8,
                (((x + y) * 31) % 256) as u8,
            ])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_capacity() {
        let stego = ImageStego::from_image(create_test_image(100, 100));
        // 30000 slots, 32 for the header
        assert_eq!(stego.slot_count(), 30000);
        assert_eq!(stego.capacity(), 3746);
    }

    #[test]
    fn test_channel_index_skips_alpha() {
        let indices: Vec<usize> = (0..6).map(channel_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 4, 5, 6]);
    }

    #[test]
    fn test_embed_and_extract() {
        let stego = ImageStego::from_image(create_test_image(100, 100));
        let data = b"Hello, entropic dispersal!";

        let hidden = ImageStego::from_image(stego.embed(data, KEY).unwrap());
        assert_eq!(hidden.extract(KEY).unwrap(), data);
    }

    #[test]
    fn test_png_roundtrip() {
        let stego = ImageStego::from_image(create_test_image(64, 64));
        let data: Vec<u8> = (0..500).map(|i| (i % 256) as u8).collect();

        let hidden = ImageStego::from_image(stego.embed(&data, KEY).unwrap());
        let png = hidden.to_png_bytes().unwrap();
        let reloaded = ImageStego::from_bytes(&png).unwrap();

        assert_eq!(reloaded.extract(KEY).unwrap(), data);
    }

    #[test]
    fn test_exact_fit_and_overflow() {
        // 12x12 = 432 slots: 32 header + 400 bits = 50 bytes
        let stego = ImageStego::from_image(create_test_image(12, 12));
        assert_eq!(stego.capacity(), 50);

        let fits = vec![0xA5u8; 50];
        let hidden = ImageStego::from_image(stego.embed(&fits, KEY).unwrap());
        assert_eq!(hidden.extract(KEY).unwrap(), fits);

        let result = stego.embed(&[0u8; 51], KEY);
        assert!(matches!(
            result,
            Err(ImageStegoError::CarrierCapacityExceeded { needed: 440, capacity: 432 })
        ));
    }

    #[test]
    fn test_alpha_channel_untouched() {
        let img = ImageBuffer::from_fn(20, 20, |x, _| image::Rgba([10, 20, 30, (x * 10) as u8]));
        let original = DynamicImage::ImageRgba8(img);
        let hidden = ImageStego::from_image(original.clone()).embed(b"abc", KEY).unwrap();

        let before = original.to_rgba8();
        let after = hidden.to_rgba8();
        for (a, b) in before.pixels().zip(after.pixels()) {
            assert_eq!(a.0[3], b.0[3]);
            for c in 0..3 {
                assert_eq!(a.0[c] & 0xFE, b.0[c] & 0xFE);
            }
        }
    }

    #[test]
    fn test_noise_fill_is_unbiased() {
        let stego = ImageStego::from_image(create_test_image(200, 200));
        let hidden = stego.embed(b"short", KEY).unwrap().to_rgba8();

        let slot_count = 200 * 200 * 3;
        let order = CryptoPrng::from_key(KEY, DISPERSAL_SALT).unwrap().permutation(slot_count);
        let used = HEADER_BITS + 5 * 8;

        let unused = &order[used..];
        let ones = unused
            .iter()
            .filter(|&&slot| hidden.as_raw()[channel_index(slot)] & 1 == 1)
            .count() as f64;
        let n = unused.len() as f64;
        let expected = n / 2.0;
        let chi_square = (ones - expected).powi(2) / expected + ((n - ones) - expected).powi(2) / expected;

        // 1 degree of freedom, p = 0.0001
        assert!(chi_square < 15.14, "chi-square {chi_square} too large");
    }

    #[test]
    fn test_clean_image_yields_nothing() {
        // A flat image has an all-zero LSB plane: header reads 0 bits
        let flat = ImageBuffer::from_pixel(30, 30, Rgb([128u8, 128, 128]));
        let stego = ImageStego::from_image(DynamicImage::ImageRgb8(flat));
        assert_eq!(stego.extract(KEY), Some(Vec::new()));

        let odd = ImageBuffer::from_pixel(30, 30, Rgb([129u8, 129, 129]));
        let stego = ImageStego::from_image(DynamicImage::ImageRgb8(odd));
        assert_eq!(stego.extract(KEY), None);
    }

    #[test]
    fn test_wrong_key_does_not_extract() {
        let stego = ImageStego::from_image(create_test_image(100, 100));
        let data = b"secret pixels";
        let hidden = ImageStego::from_image(stego.embed(data, KEY).unwrap());
        assert_ne!(hidden.extract(&[7u8; 32]), Some(data.to_vec()));
    }

    #[test]
    fn test_scrub_produces_png() {
        let mut bmp = Vec::new();
        create_test_image(8, 8)
            .write_to(&mut Cursor::new(&mut bmp), ImageFormat::Bmp)
            .unwrap();
        let png = scrub_to_png(&bmp).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        assert!(scrub_to_png(b"not an image").is_err());
    }
}
