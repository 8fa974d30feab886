//! # minedive-core
//!
//! Shared library for the minedive WebRTC signaling relay containing the JSON
//! wire protocol, the nonce counter and the alias codec.
//!
//! This crate has no dependencies on sockets, async runtimes, or the process
//! environment.  Everything in it can be exercised from a plain `#[test]`.
//!
//! # Architecture overview
//!
//! minedive lets browser peers find each other and exchange WebRTC
//! offer/answer payloads.  Peers never learn each other's chosen names: the
//! server hands out *aliases* instead, which only the server can map back.
//!
//! - **`protocol`** – The JSON messages exchanged over the WebSocket and the
//!   [`NonceCounter`] that keeps alias nonces unique.
//!
//! - **`crypto`** – The [`AliasCodec`]: authenticated encryption of a name
//!   under a per-connection secret key, rendered as base64.

pub mod crypto;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `minedive_core::AliasCodec` instead of `minedive_core::crypto::alias::AliasCodec`.
pub use crypto::alias::{decode_alias, encode_alias, AliasCodec, AliasError};
pub use protocol::messages::{ErrorKind, MessageKind, ServerMsg, Target};
pub use protocol::nonce::{NonceCounter, NonceError, NONCE_LEN};
