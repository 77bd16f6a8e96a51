//! Zero-width character steganography for text carriers.
//!
//! Each payload bit becomes an invisible character inserted between the
//! visible characters of the carrier. The key selects which three of five
//! zero-width characters mean `0`, `1` and end-of-data, and where in the
//! carrier each symbol lands.
//!
//! Symbols appear in the text in bit order, so extraction is a single scan.

use thiserror::Error;
use tracing::debug;

use crate::crypto::{sha256, CryptoPrng, KdfError};

/// Zero-width characters the alphabet is drawn from.
pub const ZERO_WIDTH_POOL: [char; 5] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// Hash salt for deriving the alphabet.
const ALPHABET_SALT: &[u8] = b"steg-config-salt";

/// PRNG salt for choosing insertion slots.
const SHUFFLE_SALT: &[u8] = b"text-steganography-shuffle-salt";

/// Errors that can occur during text steganography.
#[derive(Error, Debug)]
pub enum TextStegoError {
    #[error("Carrier too small: need {needed} insertion slots, have {available}")]
    CarrierTooSmall { needed: usize, available: usize },

    #[error("Key derivation error: {0}")]
    Kdf(#[from] KdfError),
}

/// Per-key assignment of zero-width characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StegoAlphabet {
    pub zero: char,
    pub one: char,
    pub end: char,
}

/// Derives the alphabet for `key`.
pub fn derive_alphabet(key: &[u8]) -> StegoAlphabet {
    let mut input = Vec::with_capacity(key.len() + ALPHABET_SALT.len());
    input.extend_from_slice(key);
    input.extend_from_slice(ALPHABET_SALT);
    let hash = sha256(&input);

    let mut pool = ZERO_WIDTH_POOL;
    for i in (1..pool.len()).rev() {
        let j = usize::from(hash[i % hash.len()]) % (i + 1);
        pool.swap(i, j);
    }

    StegoAlphabet {
        zero: pool[0],
        one: pool[1],
        end: pool[2],
    }
}

/// Removes every zero-width pool character from `text`.
pub fn strip_zero_width(text: &str) -> String {
    text.chars().filter(|c| !ZERO_WIDTH_POOL.contains(c)).collect()
}

/// Bytes that fit into `carrier` (after stripping zero-width characters).
pub fn capacity(carrier: &str) -> usize {
    // slots = chars + 1; one slot is reserved for the end marker
    strip_zero_width(carrier).chars().count() / 8
}

/// Hides `data` in `carrier`.
///
/// Needs `8 * data.len() + 1` insertion slots; a carrier of `n` characters
/// has `n + 1`. Never appends past the carrier.
pub fn embed(carrier: &str, data: &[u8], key: &[u8]) -> Result<String, TextStegoError> {
    let alphabet = derive_alphabet(key);
    let carrier: Vec<char> = strip_zero_width(carrier).chars().collect();

    let mut symbols = Vec::with_capacity(data.len() * 8 + 1);
    for byte in data {
        for shift in (0..8).rev() {
            symbols.push(if (byte >> shift) & 1 == 1 {
                alphabet.one
            } else {
                alphabet.zero
            });
        }
    }
    symbols.push(alphabet.end);

    let available = carrier.len() + 1;
    if symbols.len() > available {
        return Err(TextStegoError::CarrierTooSmall {
            needed: symbols.len(),
            available,
        });
    }

    let mut slots = CryptoPrng::from_key(key, SHUFFLE_SALT)?.permutation(available);
    slots.truncate(symbols.len());
    slots.sort_unstable();

    let mut out = String::with_capacity(carrier.len() * 4 + symbols.len() * 3);
    let mut pending = slots.iter().zip(&symbols).peekable();
    for slot in 0..available {
        if let Some((_, symbol)) = pending.next_if(|(s, _)| **s == slot) {
            out.push(*symbol);
        }
        if let Some(c) = carrier.get(slot) {
            out.push(*c);
        }
    }

    debug!(bytes = data.len(), slots = available, "embedded data in text carrier");
    Ok(out)
}

/// Recovers data hidden with the same key.
///
/// Returns `None` when no end marker is found or the bit count is not a
/// whole number of bytes.
pub fn extract(text: &str, key: &[u8]) -> Option<Vec<u8>> {
    let alphabet = derive_alphabet(key);

    let mut bits = Vec::new();
    let mut terminated = false;
    for c in text.chars() {
        if c == alphabet.zero {
            bits.push(0u8);
        } else if c == alphabet.one {
            bits.push(1u8);
        } else if c == alphabet.end {
            terminated = true;
            break;
        }
    }

    if !terminated || bits.len() % 8 != 0 {
        return None;
    }

    Some(
        bits.chunks(8)
            .map(|chunk| chunk.iter().fold(0u8, |acc, bit| (acc << 1) | bit))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn carrier(chars: usize) -> String {
        "The quick brown fox jumps over the lazy dog. "
            .chars()
            .cycle()
            .take(chars)
            .collect()
    }

    #[test]
    fn test_alphabet_is_distinct_and_keyed() {
        let a = derive_alphabet(KEY);
        assert_ne!(a.zero, a.one);
        assert_ne!(a.one, a.end);
        assert_ne!(a.zero, a.end);
        assert_eq!(a, derive_alphabet(KEY));

        // Over many keys the assignment must vary
        let distinct: std::collections::HashSet<_> = (0u8..32)
            .map(|i| {
                let a = derive_alphabet(&[i; 32]);
                (a.zero, a.one, a.end)
            })
            .collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn test_embed_and_extract() {
        let secret = b"meet me at noon";
        let stego = embed(&carrier(500), secret, KEY).unwrap();

        assert_eq!(strip_zero_width(&stego), carrier(500));
        assert_eq!(extract(&stego, KEY).unwrap(), secret);
    }

    #[test]
    fn test_exact_capacity_boundary() {
        let data = b"hi";
        let needed = data.len() * 8 + 1;

        // n chars give n + 1 slots
        let too_small = embed(&carrier(needed - 2), data, KEY);
        assert!(matches!(
            too_small,
            Err(TextStegoError::CarrierTooSmall { needed: 17, available: 16 })
        ));

        let stego = embed(&carrier(needed - 1), data, KEY).unwrap();
        assert_eq!(extract(&stego, KEY).unwrap(), data);
    }

    #[test]
    fn test_wrong_key_finds_nothing_useful() {
        let stego = embed(&carrier(400), b"secret", KEY).unwrap();
        let other = [0x55u8; 32];
        assert_ne!(extract(&stego, &other), Some(b"secret".to_vec()));
    }

    #[test]
    fn test_plain_text_has_no_payload() {
        assert_eq!(extract("nothing hidden here", KEY), None);
    }

    #[test]
    fn test_empty_data_is_just_an_end_marker() {
        let stego = embed("ab", b"", KEY).unwrap();
        assert_eq!(stego.chars().count(), 3);
        assert_eq!(extract(&stego, KEY).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_existing_zero_width_characters_are_replaced() {
        let dirty = format!("hello{}world, how are you doing today my friend", '\u{200B}');
        let stego = embed(&dirty, b"x", KEY).unwrap();
        assert_eq!(extract(&stego, KEY).unwrap(), b"x");
    }

    #[test]
    fn test_capacity() {
        assert_eq!(capacity(&carrier(80)), 10);
    }
}
