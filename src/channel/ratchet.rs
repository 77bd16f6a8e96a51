//! KDF chains and the DH ratchet.
//!
//! Root chain: `kdf_rk(rk, dh) -> (rk', ck)` mixes every fresh DH output into
//! the root key. Sending and receiving chains: `kdf_ck(ck) -> (mk, ck')`
//! yields a one-time message key and advances the chain; the old chain key
//! is overwritten and cannot be recovered from the new one.

use std::collections::{HashMap, VecDeque};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use super::error::ChannelError;
use super::message::MessageHeader;
use crate::config::ChannelConfig;
use crate::crypto::{aead_decrypt, aead_encrypt, hkdf_32, hkdf_expand, DhKeyPair};

/// Domain separation labels for HKDF derivations.
const LABEL_ROOT: &[u8] = b"chimera-arrk-dke-rk";
const LABEL_MESSAGE_KEY: &[u8] = b"chimera-arrk-dke-msg";
const LABEL_CHAIN_ADVANCE: &[u8] = b"chimera-arrk-dke-chain";

/// Root-chain step: returns `(new_root_key, new_chain_key)`.
pub fn kdf_rk(root_key: &[u8; 32], dh_output: &[u8; 32]) -> Result<([u8; 32], [u8; 32]), ChannelError> {
    let okm = Zeroizing::new(hkdf_expand(dh_output, root_key, LABEL_ROOT, 64)?);
    let mut new_root = [0u8; 32];
    let mut chain = [0u8; 32];
    new_root.copy_from_slice(&okm[..32]);
    chain.copy_from_slice(&okm[32..]);
    Ok((new_root, chain))
}

/// Symmetric-chain step: returns `(message_key, next_chain_key)`.
pub fn kdf_ck(chain_key: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    let message_key = hkdf_32(chain_key, &[], LABEL_MESSAGE_KEY);
    let next_chain = hkdf_32(chain_key, &[], LABEL_CHAIN_ADVANCE);
    (message_key, next_chain)
}

/// Associated data: the sender's ratchet public key in base64.
fn associated_data(dh_pub: &[u8; 32]) -> Vec<u8> {
    BASE64.encode(dh_pub).into_bytes()
}

/// Bounded cache of skipped message keys, evicted oldest-first.
#[derive(Clone, Default)]
struct SkippedKeys {
    keys: HashMap<([u8; 32], u32), [u8; 32]>,
    order: VecDeque<([u8; 32], u32)>,
}

impl SkippedKeys {
    fn insert(&mut self, id: ([u8; 32], u32), key: [u8; 32], max: usize) {
        while self.keys.len() >= max {
            let Some(oldest) = self.order.pop_front() else { break };
            if let Some(mut evicted) = self.keys.remove(&oldest) {
                evicted.zeroize();
            }
        }
        if max > 0 {
            self.keys.insert(id, key);
            self.order.push_back(id);
        }
    }

    fn get(&self, id: &([u8; 32], u32)) -> Option<[u8; 32]> {
        self.keys.get(id).copied()
    }

    fn take(&mut self, id: &([u8; 32], u32)) -> Option<[u8; 32]> {
        let key = self.keys.remove(id)?;
        self.order.retain(|entry| entry != id);
        Some(key)
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn wipe(&mut self) {
        for (_, key) in self.keys.iter_mut() {
            key.zeroize();
        }
        self.keys.clear();
        self.order.clear();
    }
}

impl Drop for SkippedKeys {
    fn drop(&mut self) {
        self.wipe();
    }
}

/// Double ratchet state for one side of a channel.
///
/// All key material is zeroized on drop.
pub struct RatchetState {
    /// Our current ratchet key pair (DHs).
    dh_self: DhKeyPair,
    /// Peer's current ratchet public key (DHr).
    dh_remote: Option<[u8; 32]>,
    root_key: [u8; 32],
    send_chain: Option<[u8; 32]>,
    recv_chain: Option<[u8; 32]>,
    send_count: u32,
    recv_count: u32,
    prev_chain_len: u32,
    skipped: SkippedKeys,
    config: ChannelConfig,
}

impl Drop for RatchetState {
    fn drop(&mut self) {
        self.root_key.zeroize();
        if let Some(ck) = self.send_chain.as_mut() {
            ck.zeroize();
        }
        if let Some(ck) = self.recv_chain.as_mut() {
            ck.zeroize();
        }
        self.skipped.wipe();
    }
}

impl RatchetState {
    /// State for the party that sent the handshake offer.
    ///
    /// `dh_self` is the offered ephemeral pair, `remote_public` the
    /// responder's reply key. The first sending chain comes from their DH.
    pub fn new_initiator(
        dh_self: DhKeyPair,
        remote_public: [u8; 32],
        config: ChannelConfig,
    ) -> Result<Self, ChannelError> {
        let dh = dh_self.diffie_hellman(&remote_public);
        let (root_key, send_chain) = kdf_rk(&[0u8; 32], &dh)?;
        Ok(Self {
            dh_self,
            dh_remote: Some(remote_public),
            root_key,
            send_chain: Some(send_chain),
            recv_chain: None,
            send_count: 0,
            recv_count: 0,
            prev_chain_len: 0,
            skipped: SkippedKeys::default(),
            config,
        })
    }

    /// State for the responder.
    ///
    /// `dh_reply` is the pair whose public half goes back in the reply. Its
    /// DH with the initiator seeds the receiving chain; an immediate ratchet
    /// step with a fresh pair seeds the sending chain, so both directions
    /// are usable as soon as the handshake completes.
    pub fn new_responder(
        dh_reply: &DhKeyPair,
        initiator_public: [u8; 32],
        config: ChannelConfig,
    ) -> Result<Self, ChannelError> {
        let dh = dh_reply.diffie_hellman(&initiator_public);
        let (root_key, recv_chain) = kdf_rk(&[0u8; 32], &dh)?;

        let dh_self = DhKeyPair::generate();
        let dh = dh_self.diffie_hellman(&initiator_public);
        let (root_key, send_chain) = kdf_rk(&root_key, &dh)?;

        Ok(Self {
            dh_self,
            dh_remote: Some(initiator_public),
            root_key,
            send_chain: Some(send_chain),
            recv_chain: Some(recv_chain),
            send_count: 0,
            recv_count: 0,
            prev_chain_len: 0,
            skipped: SkippedKeys::default(),
            config,
        })
    }

    /// Our current ratchet public key.
    pub fn public_key(&self) -> [u8; 32] {
        self.dh_self.public_bytes()
    }

    pub fn messages_sent(&self) -> u32 {
        self.send_count
    }

    pub fn messages_received(&self) -> u32 {
        self.recv_count
    }

    pub fn skipped_key_count(&self) -> usize {
        self.skipped.len()
    }

    /// Encrypts one message and advances the sending chain.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<(MessageHeader, Vec<u8>), ChannelError> {
        let chain = self
            .send_chain
            .as_mut()
            .ok_or(ChannelError::RatchetStateInvalid("no sending chain"))?;
        let (message_key, next) = kdf_ck(chain);
        *chain = next;
        let message_key = Zeroizing::new(message_key);

        let header = MessageHeader {
            dh_pub: self.dh_self.public_bytes(),
            n: self.send_count,
            pn: self.prev_chain_len,
        };
        self.send_count += 1;

        let ciphertext = aead_encrypt(&message_key, plaintext, Some(&associated_data(&header.dh_pub)))?;
        Ok((header, ciphertext))
    }

    /// Decrypts one message, ratcheting and caching skipped keys as needed.
    ///
    /// On authentication failure the state is left as it was before the call.
    pub fn decrypt(&mut self, header: &MessageHeader, ciphertext: &[u8]) -> Result<Vec<u8>, ChannelError> {
        let aad = associated_data(&header.dh_pub);

        let id = (header.dh_pub, header.n);
        if let Some(message_key) = self.skipped.get(&id) {
            let message_key = Zeroizing::new(message_key);
            let plaintext = aead_decrypt(&message_key, ciphertext, Some(&aad))?;
            // Consumed only once authenticated
            if let Some(mut used) = self.skipped.take(&id) {
                used.zeroize();
            }
            return Ok(plaintext);
        }

        let snapshot = self.snapshot();
        match self.decrypt_advancing(header, ciphertext, &aad) {
            Ok(plaintext) => Ok(plaintext),
            Err(e) => {
                self.restore(snapshot);
                Err(e)
            }
        }
    }

    fn decrypt_advancing(
        &mut self,
        header: &MessageHeader,
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, ChannelError> {
        if self.dh_remote != Some(header.dh_pub) {
            self.skip_message_keys(header.pn)?;
            self.dh_ratchet(&header.dh_pub)?;
        }
        if header.n < self.recv_count {
            return Err(ChannelError::MessageKeyUnavailable(header.n));
        }
        self.skip_message_keys(header.n)?;

        let chain = self
            .recv_chain
            .as_mut()
            .ok_or(ChannelError::RatchetStateInvalid("no receiving chain"))?;
        let (message_key, next) = kdf_ck(chain);
        *chain = next;
        self.recv_count += 1;

        let message_key = Zeroizing::new(message_key);
        Ok(aead_decrypt(&message_key, ciphertext, Some(aad))?)
    }

    /// Caches receiving-chain keys up to (not including) message `until`.
    fn skip_message_keys(&mut self, until: u32) -> Result<(), ChannelError> {
        let Some(chain) = self.recv_chain.as_mut() else {
            return Ok(());
        };
        let Some(remote) = self.dh_remote else {
            return Err(ChannelError::RatchetStateInvalid("no remote ratchet key"));
        };

        if until > self.recv_count {
            let requested = until - self.recv_count;
            if requested > self.config.max_skip_per_chain {
                return Err(ChannelError::TooManySkipped {
                    max: self.config.max_skip_per_chain,
                    requested,
                });
            }
        }

        while self.recv_count < until {
            let (message_key, next) = kdf_ck(chain);
            *chain = next;
            self.skipped
                .insert((remote, self.recv_count), message_key, self.config.max_skipped_keys);
            self.recv_count += 1;
        }
        Ok(())
    }

    /// DH ratchet step on a new remote key.
    fn dh_ratchet(&mut self, remote_public: &[u8; 32]) -> Result<(), ChannelError> {
        self.prev_chain_len = self.send_count;
        self.send_count = 0;
        self.recv_count = 0;
        self.dh_remote = Some(*remote_public);

        let dh = self.dh_self.diffie_hellman(remote_public);
        let (root_key, recv_chain) = kdf_rk(&self.root_key, &dh)?;
        self.root_key = root_key;
        self.recv_chain = Some(recv_chain);

        self.dh_self = DhKeyPair::generate();
        let dh = self.dh_self.diffie_hellman(remote_public);
        let (root_key, send_chain) = kdf_rk(&self.root_key, &dh)?;
        self.root_key = root_key;
        self.send_chain = Some(send_chain);

        debug!(prev_chain_len = self.prev_chain_len, "dh ratchet step");
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            dh_self: self.dh_self.clone(),
            dh_remote: self.dh_remote,
            root_key: Zeroizing::new(self.root_key),
            send_chain: self.send_chain.map(Zeroizing::new),
            recv_chain: self.recv_chain.map(Zeroizing::new),
            send_count: self.send_count,
            recv_count: self.recv_count,
            prev_chain_len: self.prev_chain_len,
            skipped: self.skipped.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.dh_self = snapshot.dh_self;
        self.dh_remote = snapshot.dh_remote;
        self.root_key = *snapshot.root_key;
        self.send_chain = snapshot.send_chain.map(|ck| *ck);
        self.recv_chain = snapshot.recv_chain.map(|ck| *ck);
        self.send_count = snapshot.send_count;
        self.recv_count = snapshot.recv_count;
        self.prev_chain_len = snapshot.prev_chain_len;
        // Drops the attempt's cache, including keys it evicted or added
        self.skipped = snapshot.skipped;
    }
}

/// Ratchet state saved before a decrypt attempt.
struct Snapshot {
    dh_self: DhKeyPair,
    dh_remote: Option<[u8; 32]>,
    root_key: Zeroizing<[u8; 32]>,
    send_chain: Option<Zeroizing<[u8; 32]>>,
    recv_chain: Option<Zeroizing<[u8; 32]>>,
    send_count: u32,
    recv_count: u32,
    prev_chain_len: u32,
    skipped: SkippedKeys,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (RatchetState, RatchetState) {
        pair_with(ChannelConfig::default())
    }

    fn pair_with(config: ChannelConfig) -> (RatchetState, RatchetState) {
        let initiator_dh = DhKeyPair::generate();
        let reply_dh = DhKeyPair::generate();

        let bob = RatchetState::new_responder(&reply_dh, initiator_dh.public_bytes(), config).unwrap();
        let alice = RatchetState::new_initiator(initiator_dh, reply_dh.public_bytes(), config).unwrap();
        (alice, bob)
    }

    #[test]
    fn test_kdf_ck_advances() {
        let ck = [1u8; 32];
        let (mk1, ck2) = kdf_ck(&ck);
        let (mk2, _) = kdf_ck(&ck2);
        assert_ne!(mk1, mk2);
        assert_ne!(ck2, ck);
        assert_ne!(mk1, ck2);
    }

    #[test]
    fn test_kdf_rk_depends_on_both_inputs() {
        let (rk_a, ck_a) = kdf_rk(&[0u8; 32], &[1u8; 32]).unwrap();
        let (rk_b, _) = kdf_rk(&[9u8; 32], &[1u8; 32]).unwrap();
        let (rk_c, _) = kdf_rk(&[0u8; 32], &[2u8; 32]).unwrap();
        assert_ne!(rk_a, ck_a);
        assert_ne!(rk_a, rk_b);
        assert_ne!(rk_a, rk_c);
    }

    #[test]
    fn test_both_directions_after_setup() {
        let (mut alice, mut bob) = pair();

        let (h, c) = alice.encrypt(b"hello bob").unwrap();
        assert_eq!(bob.decrypt(&h, &c).unwrap(), b"hello bob");

        let (h, c) = bob.encrypt(b"hello alice").unwrap();
        assert_eq!(alice.decrypt(&h, &c).unwrap(), b"hello alice");
    }

    #[test]
    fn test_responder_may_send_first() {
        let (mut alice, mut bob) = pair();
        let (h, c) = bob.encrypt(b"first").unwrap();
        assert_eq!(alice.decrypt(&h, &c).unwrap(), b"first");
    }

    #[test]
    fn test_ping_pong_rotates_keys() {
        let (mut alice, mut bob) = pair();
        let mut seen = std::collections::HashSet::new();

        for round in 0..5 {
            let (h, c) = alice.encrypt(format!("a{round}").as_bytes()).unwrap();
            seen.insert(h.dh_pub);
            assert_eq!(bob.decrypt(&h, &c).unwrap(), format!("a{round}").as_bytes());

            let (h, c) = bob.encrypt(format!("b{round}").as_bytes()).unwrap();
            seen.insert(h.dh_pub);
            assert_eq!(alice.decrypt(&h, &c).unwrap(), format!("b{round}").as_bytes());
        }
        // Every turn of the conversation uses a fresh ratchet key
        assert!(seen.len() >= 9);
    }

    #[test]
    fn test_out_of_order_within_chain() {
        let (mut alice, mut bob) = pair();
        let m0 = alice.encrypt(b"zero").unwrap();
        let m1 = alice.encrypt(b"one").unwrap();
        let m2 = alice.encrypt(b"two").unwrap();

        assert_eq!(bob.decrypt(&m2.0, &m2.1).unwrap(), b"two");
        assert_eq!(bob.skipped_key_count(), 2);
        assert_eq!(bob.decrypt(&m0.0, &m0.1).unwrap(), b"zero");
        assert_eq!(bob.decrypt(&m1.0, &m1.1).unwrap(), b"one");
        assert_eq!(bob.skipped_key_count(), 0);
    }

    #[test]
    fn test_late_message_from_previous_chain() {
        let (mut alice, mut bob) = pair();
        let late = alice.encrypt(b"late").unwrap();
        let on_time = alice.encrypt(b"on time").unwrap();
        assert_eq!(bob.decrypt(&on_time.0, &on_time.1).unwrap(), b"on time");

        let reply = bob.encrypt(b"reply").unwrap();
        assert_eq!(alice.decrypt(&reply.0, &reply.1).unwrap(), b"reply");
        let next = alice.encrypt(b"new chain").unwrap();
        assert_eq!(bob.decrypt(&next.0, &next.1).unwrap(), b"new chain");

        assert_eq!(bob.decrypt(&late.0, &late.1).unwrap(), b"late");
    }

    #[test]
    fn test_replay_rejected() {
        let (mut alice, mut bob) = pair();
        let (h, c) = alice.encrypt(b"once").unwrap();
        bob.decrypt(&h, &c).unwrap();
        assert!(matches!(
            bob.decrypt(&h, &c),
            Err(ChannelError::MessageKeyUnavailable(0))
        ));
    }

    #[test]
    fn test_tampering_leaves_state_intact() {
        let (mut alice, mut bob) = pair();
        let (h, c) = alice.encrypt(b"payload").unwrap();

        let mut forged = c.clone();
        forged[20] ^= 1;
        assert!(matches!(bob.decrypt(&h, &forged), Err(ChannelError::AuthenticationFailure)));
        assert_eq!(bob.decrypt(&h, &c).unwrap(), b"payload");
    }

    #[test]
    fn test_forged_skip_keeps_cached_keys() {
        let config = ChannelConfig {
            max_skipped_keys: 2,
            max_skip_per_chain: 10,
        };
        let (mut alice, mut bob) = pair_with(config);
        let m0 = alice.encrypt(b"zero").unwrap();
        let m1 = alice.encrypt(b"one").unwrap();
        let m2 = alice.encrypt(b"two").unwrap();
        assert_eq!(bob.decrypt(&m2.0, &m2.1).unwrap(), b"two");
        assert_eq!(bob.skipped_key_count(), 2);

        // Would evict keys 0 and 1 to cache 3 and 4 if it were kept
        let forged = MessageHeader { n: 5, ..m2.0 };
        assert!(bob.decrypt(&forged, &[0u8; 48]).is_err());
        assert_eq!(bob.skipped_key_count(), 2);

        assert_eq!(bob.decrypt(&m0.0, &m0.1).unwrap(), b"zero");
        assert_eq!(bob.decrypt(&m1.0, &m1.1).unwrap(), b"one");
        let m3 = alice.encrypt(b"three").unwrap();
        assert_eq!(bob.decrypt(&m3.0, &m3.1).unwrap(), b"three");
    }

    #[test]
    fn test_forged_cached_message_keeps_key() {
        let (mut alice, mut bob) = pair();
        let m0 = alice.encrypt(b"zero").unwrap();
        let m1 = alice.encrypt(b"one").unwrap();
        assert_eq!(bob.decrypt(&m1.0, &m1.1).unwrap(), b"one");

        assert!(bob.decrypt(&m0.0, &[7u8; 40]).is_err());
        assert_eq!(bob.skipped_key_count(), 1);
        assert_eq!(bob.decrypt(&m0.0, &m0.1).unwrap(), b"zero");
    }

    #[test]
    fn test_header_key_is_bound_as_aad() {
        let (mut alice, mut bob) = pair();
        let (mut h, c) = alice.encrypt(b"payload").unwrap();
        h.dh_pub = DhKeyPair::generate().public_bytes();
        assert!(bob.decrypt(&h, &c).is_err());
    }

    #[test]
    fn test_skip_limit_per_chain() {
        let config = ChannelConfig {
            max_skip_per_chain: 3,
            ..ChannelConfig::default()
        };
        let (mut alice, mut bob) = pair_with(config);
        let mut last = None;
        for _ in 0..5 {
            last = Some(alice.encrypt(b"x").unwrap());
        }
        let (h, c) = last.unwrap();
        assert!(matches!(
            bob.decrypt(&h, &c),
            Err(ChannelError::TooManySkipped { max: 3, requested: 4 })
        ));
    }

    #[test]
    fn test_skipped_cache_evicts_oldest() {
        let config = ChannelConfig {
            max_skipped_keys: 2,
            max_skip_per_chain: 10,
        };
        let (mut alice, mut bob) = pair_with(config);
        let messages: Vec<_> = (0..4).map(|i| alice.encrypt(&[i]).unwrap()).collect();

        // Skips 0, 1, 2; only 1 and 2 fit
        assert_eq!(bob.decrypt(&messages[3].0, &messages[3].1).unwrap(), vec![3]);
        assert_eq!(bob.skipped_key_count(), 2);
        assert!(bob.decrypt(&messages[0].0, &messages[0].1).is_err());
        assert_eq!(bob.decrypt(&messages[1].0, &messages[1].1).unwrap(), vec![1]);
    }

    #[test]
    fn test_message_key_cannot_open_neighbours() {
        let ck = [5u8; 32];
        let (mk0, ck1) = kdf_ck(&ck);
        let (mk1, _) = kdf_ck(&ck1);
        let aad = associated_data(&[0u8; 32]);
        let c1 = aead_encrypt(&mk1, b"n+1", Some(&aad)).unwrap();
        assert!(aead_decrypt(&mk0, &c1, Some(&aad)).is_err());
    }
}
