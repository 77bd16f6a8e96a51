//! Cryptographic primitives for Chimera.
//!
//! This module provides:
//! - Authenticated encryption (ChaCha20-Poly1305)
//! - HKDF-SHA256, HMAC-SHA512 and SHA-256 helpers
//! - Argon2id password hashing with named cost tiers
//! - A keyed deterministic PRNG and keyed permutations
//! - X25519 key agreement
//! - DEFLATE compression

pub mod compression;
pub mod exchange;
pub mod kdf;
pub mod password;
pub mod permutation;
pub mod prng;
pub mod symmetric;

pub use compression::{compress, compress_if_smaller, decompress, CompressionError};
pub use exchange::{random_public_bytes, DhKeyPair};
pub use kdf::{hkdf_32, hkdf_expand, hmac_sha512, sha256, KdfError};
pub use password::{hash_password, hash_password_32, Argon2Cost, KdfProfile};
pub use permutation::{apply_block_permutation, reverse_block_permutation};
pub use prng::{invert_permutation, CryptoPrng, PrngMaterial};
pub use symmetric::{aead_decrypt, aead_encrypt, SymmetricError};
