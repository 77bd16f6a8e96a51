//! Deniable PAKE-gated handshake.
//!
//! Both peers share a handshake password and a distinct duress password.
//! Each is stretched with Argon2id, salted by the channel id, into a PAKE key.
//! The offer always carries two sealed fields of identical shape:
//!
//! - `real`: the initiator's ephemeral public key under the handshake key
//! - `duress`: 32 random bytes under the duress key
//!
//! The responder's reply is its ephemeral public key under whichever key
//! opened the offer.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::error::ChannelError;
use crate::crypto::{aead_decrypt, aead_encrypt, hash_password_32, random_public_bytes, sha256, Argon2Cost};

/// Handshake offer as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakePayload {
    pub real: String,
    pub duress: String,
}

impl HandshakePayload {
    pub fn to_json(&self) -> Result<String, ChannelError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ChannelError> {
        serde_json::from_str(json.trim()).map_err(|e| ChannelError::MalformedEnvelope(e.to_string()))
    }
}

/// PAKE keys for both passwords.
pub struct PakeKeys {
    pub real: Zeroizing<[u8; 32]>,
    pub duress: Zeroizing<[u8; 32]>,
}

/// Stretches one password into a PAKE key salted by the channel id.
pub fn derive_pake_key(password: &str, channel_id: &str, cost: Argon2Cost) -> Result<Zeroizing<[u8; 32]>, ChannelError> {
    if password.is_empty() {
        return Err(ChannelError::EmptyKey);
    }
    let salt = sha256(channel_id.as_bytes());
    Ok(Zeroizing::new(hash_password_32(password.as_bytes(), &salt, cost)?))
}

/// Derives both PAKE keys, rejecting identical passwords.
pub fn derive_pake_keys(
    handshake_key: &str,
    duress_key: &str,
    channel_id: &str,
    cost: Argon2Cost,
) -> Result<PakeKeys, ChannelError> {
    if handshake_key == duress_key {
        return Err(ChannelError::KeysNotDistinct);
    }
    Ok(PakeKeys {
        real: derive_pake_key(handshake_key, channel_id, cost)?,
        duress: derive_pake_key(duress_key, channel_id, cost)?,
    })
}

/// Builds the offer for `ephemeral_public`.
pub fn build_offer(keys: &PakeKeys, ephemeral_public: &[u8; 32]) -> Result<HandshakePayload, ChannelError> {
    let real = aead_encrypt(&keys.real, ephemeral_public, None)?;
    let duress = aead_encrypt(&keys.duress, &random_public_bytes(), None)?;
    Ok(HandshakePayload {
        real: BASE64.encode(real),
        duress: BASE64.encode(duress),
    })
}

/// Which field of the offer opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenedWith {
    Real,
    Duress,
}

/// Tries the real field with the handshake key, then the duress field with
/// the duress key. Both attempts always run so timing does not reveal which
/// one succeeded.
pub fn open_offer(offer: &HandshakePayload, keys: &PakeKeys) -> Result<(OpenedWith, [u8; 32]), ChannelError> {
    let real = open_field(&offer.real, &keys.real);
    let duress = open_field(&offer.duress, &keys.duress);
    match (real, duress) {
        (Some(public), _) => Ok((OpenedWith::Real, public)),
        (None, Some(public)) => Ok((OpenedWith::Duress, public)),
        (None, None) => Err(ChannelError::HandshakeFailure),
    }
}

/// Seals the responder's reply.
pub fn build_reply(key: &[u8; 32], reply_public: &[u8; 32]) -> Result<String, ChannelError> {
    Ok(BASE64.encode(aead_encrypt(key, reply_public, None)?))
}

/// Opens a reply with the real key first, then the duress key.
pub fn open_reply(reply: &str, keys: &PakeKeys) -> Result<(OpenedWith, [u8; 32]), ChannelError> {
    let real = open_field(reply, &keys.real);
    let duress = open_field(reply, &keys.duress);
    match (real, duress) {
        (Some(public), _) => Ok((OpenedWith::Real, public)),
        (None, Some(public)) => Ok((OpenedWith::Duress, public)),
        (None, None) => Err(ChannelError::HandshakeFailure),
    }
}

fn open_field(field: &str, key: &[u8; 32]) -> Option<[u8; 32]> {
    let sealed = BASE64.decode(field.trim()).ok()?;
    let opened = Zeroizing::new(aead_decrypt(key, &sealed, None).ok()?);
    <[u8; 32]>::try_from(opened.as_slice()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const COST: Argon2Cost = Argon2Cost::MINIMAL;

    fn keys(real: &str, duress: &str) -> PakeKeys {
        derive_pake_keys(real, duress, "ccc-testchannel1", COST).unwrap()
    }

    #[test]
    fn test_pake_key_is_salted_by_channel() {
        let a = derive_pake_key("pw", "ccc-one", COST).unwrap();
        let b = derive_pake_key("pw", "ccc-two", COST).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_identical_passwords_rejected() {
        assert!(matches!(
            derive_pake_keys("same", "same", "ccc-x", COST),
            Err(ChannelError::KeysNotDistinct)
        ));
    }

    #[test]
    fn test_offer_fields_have_identical_shape() {
        let offer = build_offer(&keys("hs", "du"), &[9u8; 32]).unwrap();
        assert_eq!(offer.real.len(), offer.duress.len());
        let json: serde_json::Value = serde_json::from_str(&offer.to_json().unwrap()).unwrap();
        assert!(json["real"].is_string() && json["duress"].is_string());
    }

    #[test]
    fn test_open_offer_modes() {
        let ephemeral = [9u8; 32];
        let offer = build_offer(&keys("hs", "du"), &ephemeral).unwrap();

        let (mode, public) = open_offer(&offer, &keys("hs", "du")).unwrap();
        assert_eq!(mode, OpenedWith::Real);
        assert_eq!(public, ephemeral);

        let (mode, public) = open_offer(&offer, &keys("wrong", "du")).unwrap();
        assert_eq!(mode, OpenedWith::Duress);
        assert_ne!(public, ephemeral);

        assert!(matches!(
            open_offer(&offer, &keys("wrong", "also wrong")),
            Err(ChannelError::HandshakeFailure)
        ));
    }

    #[test]
    fn test_reply_opens_with_matching_key() {
        let k = keys("hs", "du");
        let reply = build_reply(&k.duress, &[3u8; 32]).unwrap();
        assert_eq!(open_reply(&reply, &k).unwrap(), (OpenedWith::Duress, [3u8; 32]));
        assert!(open_reply("garbage", &k).is_err());
    }
}
