//! Identity types for one connected client.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Server-assigned connection identifier.  Unique for the process lifetime.
pub type ClientId = u64;

/// Length of a client public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Why a `pk` field was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublicKeyError {
    #[error("public key is not valid base64")]
    NotBase64,
    #[error("public key has {0} bytes, need at least {PUBLIC_KEY_LEN}")]
    TooShort(usize),
}

/// A client's claimed public key.  The server relays it but never checks it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Decodes a base64 key and keeps its first 32 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PublicKeyError`] if `encoded` is not base64 or decodes to
    /// fewer than 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, PublicKeyError> {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|_| PublicKeyError::NotBase64)?;
        if raw.len() < PUBLIC_KEY_LEN {
            return Err(PublicKeyError::TooShort(raw.len()));
        }
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(&raw[..PUBLIC_KEY_LEN]);
        Ok(Self(bytes))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base64())
    }
}

/// Where a connection is in its lifecycle.
///
/// ```text
/// Connecting ──username──► Identified ──getkey/getpeers/offer/answer──► Active
///      │                        │                                        │
///      └────────────────────────┴──────────── transport closed ──────────┴──► Closed
/// ```
///
/// `ping` is answered in every state except `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Id assigned, no username yet.
    Connecting,
    /// Name and public key set.
    Identified,
    /// Has taken part in at least one signaling exchange.
    Active,
    /// Terminal.  The registry entry is gone.
    Closed,
}

impl ClientState {
    /// Key lookups, peer lists and offer/answer need an identified client.
    pub fn permits_signaling(self) -> bool {
        matches!(self, ClientState::Identified | ClientState::Active)
    }
}
