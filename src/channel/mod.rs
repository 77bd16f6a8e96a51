//! # Deniable ratchet channel (ARRK-DKE)
//!
//! A double-ratchet messaging channel opened by a password-gated handshake
//! with a duress fallback.
//!
//! ## Security Model
//!
//! - **PAKE handshake**: both peers prove knowledge of a shared password
//! - **Duress mode**: a second password yields a channel whose traffic is
//!   shaped exactly like real traffic but carries substituted content
//! - **DH ratchet** on every change of speaker (post-compromise security)
//! - **Symmetric ratchet** per message (forward secrecy)
//! - **Bounded skipped-key cache** for out-of-order delivery
//! - **All keys zeroized** on reset and drop

mod error;
pub mod handshake;
pub mod message;
pub mod ratchet;
mod session;

pub use error::ChannelError;
pub use handshake::HandshakePayload;
pub use message::{ChannelMessage, MessageHeader, DURESS_REPLIES};
pub use ratchet::{kdf_ck, kdf_rk, RatchetState};
pub use session::{Channel, ChannelMode, HandshakeState};
