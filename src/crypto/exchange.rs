//! X25519 key agreement.
//!
//! Ratchet key pairs are owned values; the secret half is zeroized on drop
//! by `x25519-dalek`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// An X25519 key pair.
#[derive(Clone)]
pub struct DhKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for DhKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhKeyPair")
            .field("public", &BASE64.encode(self.public.as_bytes()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl DhKeyPair {
    /// Generates a new random key pair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Returns the raw public key.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// Returns the public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// ECDH with a peer's raw public key.
    pub fn diffie_hellman(&self, peer_public: &[u8; 32]) -> Zeroizing<[u8; 32]> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*peer_public));
        Zeroizing::new(shared.to_bytes())
    }
}

/// A random 32-byte value shaped like an X25519 public key.
pub fn random_public_bytes() -> [u8; 32] {
    DhKeyPair::generate().public_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_secret_agrees() {
        let alice = DhKeyPair::generate();
        let bob = DhKeyPair::generate();

        let ab = alice.diffie_hellman(&bob.public_bytes());
        let ba = bob.diffie_hellman(&alice.public_bytes());
        assert_eq!(*ab, *ba);
    }

    #[test]
    fn test_different_peers_different_secrets() {
        let alice = DhKeyPair::generate();
        let bob = DhKeyPair::generate();
        let carol = DhKeyPair::generate();

        assert_ne!(
            *alice.diffie_hellman(&bob.public_bytes()),
            *alice.diffie_hellman(&carol.public_bytes())
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let pair = DhKeyPair::generate();
        let debug = format!("{:?}", pair);
        assert!(debug.contains("REDACTED"));
    }
}
