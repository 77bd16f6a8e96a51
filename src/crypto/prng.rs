//! Keyed deterministic PRNG.
//!
//! `CryptoPrng` turns a `(secret, counter)` seed into a reproducible stream of
//! uniform values. Permutations, stego scatter maps and the entropic veil are
//! all rebuilt from this stream at decode time, so the output sequence for a
//! given seed is part of the wire format and must never change.
//!
//! The keystream is ChaCha20: the 32-byte secret is the cipher key, the first
//! half of the counter selects the stream and the second half the starting
//! block.

use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::kdf::{hkdf_expand, KdfError};

/// Length of the PRNG secret.
pub const SECRET_LEN: usize = 32;

/// Length of the PRNG starting counter.
pub const COUNTER_LEN: usize = 16;

/// Serialized seed length (secret || counter).
pub const MATERIAL_LEN: usize = SECRET_LEN + COUNTER_LEN;

/// Keystream bytes generated per refill.
const BUFFER_SIZE: usize = 1024;

/// HKDF info for deriving PRNG seeds from a key.
const SEED_INFO: &[u8] = b"prng-seed-derivation";

/// Seed material for a [`CryptoPrng`].
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrngMaterial {
    pub secret: [u8; SECRET_LEN],
    pub counter: [u8; COUNTER_LEN],
}

impl PrngMaterial {
    /// Fresh random material.
    pub fn random() -> Self {
        let mut secret = [0u8; SECRET_LEN];
        let mut counter = [0u8; COUNTER_LEN];
        OsRng.fill_bytes(&mut secret);
        OsRng.fill_bytes(&mut counter);
        Self { secret, counter }
    }

    /// Derives material from `key` with a domain-separating `salt`.
    pub fn derive(key: &[u8], salt: &[u8]) -> Result<Self, KdfError> {
        let mut okm = hkdf_expand(key, salt, SEED_INFO, MATERIAL_LEN)?;
        let material = Self::from_bytes(&okm);
        okm.zeroize();
        material.ok_or(KdfError::InvalidLength(MATERIAL_LEN))
    }

    /// Parses `secret || counter`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != MATERIAL_LEN {
            return None;
        }
        let mut secret = [0u8; SECRET_LEN];
        let mut counter = [0u8; COUNTER_LEN];
        secret.copy_from_slice(&bytes[..SECRET_LEN]);
        counter.copy_from_slice(&bytes[SECRET_LEN..]);
        Some(Self { secret, counter })
    }

    /// Serializes as `secret || counter`.
    pub fn to_bytes(&self) -> [u8; MATERIAL_LEN] {
        let mut out = [0u8; MATERIAL_LEN];
        out[..SECRET_LEN].copy_from_slice(&self.secret);
        out[SECRET_LEN..].copy_from_slice(&self.counter);
        out
    }
}

impl std::fmt::Debug for PrngMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrngMaterial(<redacted>)")
    }
}

/// Buffered keystream generator.
pub struct CryptoPrng {
    rng: ChaCha20Rng,
    buffer: Box<[u8; BUFFER_SIZE]>,
    position: usize,
}

impl CryptoPrng {
    /// Creates a generator from explicit seed material.
    pub fn new(material: &PrngMaterial) -> Self {
        let mut rng = ChaCha20Rng::from_seed(material.secret);

        let mut stream = [0u8; 8];
        let mut block = [0u8; 8];
        stream.copy_from_slice(&material.counter[..8]);
        block.copy_from_slice(&material.counter[8..]);
        rng.set_stream(u64::from_be_bytes(stream));
        // 16 words per ChaCha block
        rng.set_word_pos(u128::from(u64::from_be_bytes(block)) * 16);

        Self {
            rng,
            buffer: Box::new([0u8; BUFFER_SIZE]),
            position: BUFFER_SIZE,
        }
    }

    /// Creates a generator keyed by `key` for one purpose (`salt`).
    pub fn from_key(key: &[u8], salt: &[u8]) -> Result<Self, KdfError> {
        let material = PrngMaterial::derive(key, salt)?;
        Ok(Self::new(&material))
    }

    fn refill(&mut self) {
        self.rng.fill_bytes(self.buffer.as_mut_slice());
        self.position = 0;
    }

    /// Returns the next value in `[0, 1)`, consuming four keystream bytes.
    pub fn next_f64(&mut self) -> f64 {
        if self.position + 4 > BUFFER_SIZE {
            self.refill();
        }
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.buffer[self.position..self.position + 4]);
        self.position += 4;
        f64::from(u32::from_be_bytes(word)) / 4_294_967_296.0
    }

    /// Returns a uniform index in `0..bound`.
    pub fn next_index(&mut self, bound: usize) -> usize {
        let idx = (self.next_f64() * bound as f64) as usize;
        // Guard against float rounding at the upper edge.
        idx.min(bound.saturating_sub(1))
    }

    /// Fills `out` with raw keystream bytes.
    pub fn fill_bytes(&mut self, out: &mut [u8]) {
        let mut written = 0;
        while written < out.len() {
            if self.position == BUFFER_SIZE {
                self.refill();
            }
            let take = (BUFFER_SIZE - self.position).min(out.len() - written);
            out[written..written + take]
                .copy_from_slice(&self.buffer[self.position..self.position + take]);
            self.position += take;
            written += take;
        }
    }

    /// Fisher-Yates shuffle driven by [`CryptoPrng::next_f64`].
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_index(i + 1);
            items.swap(i, j);
        }
    }

    /// Returns a keyed permutation of `0..size`.
    pub fn permutation(&mut self, size: usize) -> Vec<usize> {
        let mut forward: Vec<usize> = (0..size).collect();
        self.shuffle(&mut forward);
        forward
    }
}

impl Drop for CryptoPrng {
    fn drop(&mut self) {
        self.buffer.zeroize();
    }
}

/// Inverts a permutation produced by [`CryptoPrng::permutation`].
pub fn invert_permutation(forward: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0usize; forward.len()];
    for (i, &target) in forward.iter().enumerate() {
        inverse[target] = i;
    }
    inverse
}
