//! Entropic veil: the outermost keystream XOR over the whole blob set.
//!
//! The seed travels in the clear beside the blobs, so the veil adds no
//! confidentiality. It flattens the byte statistics of the transmitted
//! stream and hides raw AEAD framing (nonces, tags) from casual inspection.
//!
//! The keystream runs continuously across blob boundaries in transmission
//! order, so veiling is equivalent to XOR over the concatenation.

use crate::crypto::{CryptoPrng, PrngMaterial};

/// XORs the keystream derived from `seed` over every blob, in order.
///
/// Applying it twice with the same seed restores the input.
pub fn apply_veil(seed: &PrngMaterial, blobs: &mut [Vec<u8>]) {
    let mut prng = CryptoPrng::new(seed);
    let mut keystream = Vec::new();
    for blob in blobs.iter_mut() {
        keystream.resize(blob.len(), 0);
        prng.fill_bytes(&mut keystream);
        for (byte, k) in blob.iter_mut().zip(&keystream) {
            *byte ^= k;
        }
    }
}

/// Veils freshly sealed blobs under a new random seed.
pub fn veil(mut blobs: Vec<Vec<u8>>) -> (PrngMaterial, Vec<Vec<u8>>) {
    let seed = PrngMaterial::random();
    apply_veil(&seed, &mut blobs);
    (seed, blobs)
}

/// Removes the veil.
pub fn unveil(seed: &PrngMaterial, mut blobs: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
    apply_veil(seed, &mut blobs);
    blobs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_veil_then_unveil() {
        let blobs = vec![b"first blob".to_vec(), vec![0u8; 2000], b"x".to_vec()];
        let (seed, veiled) = veil(blobs.clone());

        assert_ne!(veiled, blobs);
        assert_eq!(unveil(&seed, veiled), blobs);
    }

    #[test]
    fn test_keystream_is_continuous_across_blobs() {
        let seed = PrngMaterial::random();

        let mut split = vec![vec![0u8; 700], vec![0u8; 900]];
        apply_veil(&seed, &mut split);

        let mut whole = vec![vec![0u8; 1600]];
        apply_veil(&seed, &mut whole);

        let joined: Vec<u8> = split.concat();
        assert_eq!(joined, whole[0]);
    }

    #[test]
    fn test_veil_flattens_zero_runs() {
        let (_, veiled) = veil(vec![vec![0u8; 4096]]);
        let zeros = veiled[0].iter().filter(|&&b| b == 0).count();
        // ~16 expected for uniform bytes
        assert!(zeros < 64);
    }

    #[test]
    fn test_wrong_seed_does_not_unveil() {
        let blobs = vec![b"secret material".to_vec()];
        let (_, veiled) = veil(blobs.clone());
        assert_ne!(unveil(&PrngMaterial::random(), veiled), blobs);
    }
}
