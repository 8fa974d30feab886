//! Alias codec: reversible, tamper-evident name tokens.
//!
//! Peers never see each other's chosen names.  When a client asks for the
//! peer list, the server encrypts every peer name under the *requesting*
//! client's secret key and hands out the result as an alias.  When the client
//! later names one of those aliases as a target, the server decrypts it with
//! the same key and looks the name up.
//!
//! # Token format
//!
//! ```text
//! base64( nonce (24 bytes) || XChaCha20-Poly1305 ciphertext || tag (16 bytes) )
//! ```
//!
//! The nonce travels in the clear; that is fine because it is never reused
//! under the same key (see [`crate::protocol::nonce`]).  The Poly1305 tag makes
//! any modification of the token detectable.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Key, XChaCha20Poly1305, XNonce,
};
use thiserror::Error;

use crate::protocol::nonce::{NonceCounter, NonceError, NONCE_LEN};

/// Length of the per-client secret key in bytes.
pub const KEY_LEN: usize = 32;

/// Number of trailing nonce bytes used as the counter by [`AliasCodec::generate`].
///
/// The leading `NONCE_LEN - COUNTER_WIDTH` bytes are a random prefix.
pub const COUNTER_WIDTH: usize = 8;

/// Errors produced by the alias codec.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AliasError {
    /// The token is not base64, too short, fails authentication, or does not
    /// decrypt to UTF-8.
    #[error("invalid alias: {0}")]
    InvalidAlias(&'static str),

    /// The nonce counter is used up; encrypting again would reuse a nonce.
    #[error("alias nonce exhausted")]
    NonceExhausted,

    /// The AEAD refused to seal the plaintext.
    #[error("alias encryption failed")]
    Seal,
}

impl From<NonceError> for AliasError {
    fn from(_: NonceError) -> Self {
        AliasError::NonceExhausted
    }
}

/// Encrypts `name` under `key`, advancing `nonce` first.
///
/// # Errors
///
/// Returns [`AliasError::NonceExhausted`] if the counter cannot advance.
pub fn encode_alias(
    name: &str,
    key: &[u8; KEY_LEN],
    nonce: &mut NonceCounter,
) -> Result<String, AliasError> {
    let nonce_bytes = nonce.advance().map_err(|e| {
        tracing::warn!(width = nonce.width(), "alias nonce counter exhausted");
        AliasError::from(e)
    })?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce_bytes), name.as_bytes())
        .map_err(|_| AliasError::Seal)?;

    let mut token = Vec::with_capacity(NONCE_LEN + sealed.len());
    token.extend_from_slice(&nonce_bytes);
    token.extend_from_slice(&sealed);
    Ok(STANDARD.encode(token))
}

/// Opens an alias produced by [`encode_alias`] under the same `key`.
///
/// # Errors
///
/// Returns [`AliasError::InvalidAlias`] for anything that is not an
/// untouched token issued under `key`.
pub fn decode_alias(alias: &str, key: &[u8; KEY_LEN]) -> Result<String, AliasError> {
    let token = STANDARD
        .decode(alias)
        .map_err(|_| AliasError::InvalidAlias("not base64"))?;
    if token.len() < NONCE_LEN {
        return Err(AliasError::InvalidAlias("shorter than nonce"));
    }

    let (nonce_bytes, sealed) = token.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let plain = cipher
        .decrypt(XNonce::from_slice(nonce_bytes), sealed)
        .map_err(|_| AliasError::InvalidAlias("authentication failed"))?;

    String::from_utf8(plain).map_err(|_| AliasError::InvalidAlias("not UTF-8"))
}

/// Per-client secret key and nonce counter.
///
/// One codec is created for every connection and lives as long as it.  The
/// key never leaves this struct; the `Debug` impl redacts it.
pub struct AliasCodec {
    key: [u8; KEY_LEN],
    nonce: NonceCounter,
}

impl AliasCodec {
    /// Creates a codec with a fresh random key and a random nonce prefix.
    ///
    /// Both values come from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(XChaCha20Poly1305::generate_key(OsRng).as_slice());

        // Random prefix, counter bytes start at zero.
        let mut initial = [0u8; NONCE_LEN];
        initial.copy_from_slice(XChaCha20Poly1305::generate_nonce(OsRng).as_slice());
        initial[NONCE_LEN - COUNTER_WIDTH..].fill(0);

        Self::from_parts(key, NonceCounter::new(initial, COUNTER_WIDTH))
    }

    /// Creates a codec from explicit key material.
    pub fn from_parts(key: [u8; KEY_LEN], nonce: NonceCounter) -> Self {
        Self { key, nonce }
    }

    /// Produces a fresh alias for `name`.
    ///
    /// Every call uses a new nonce, so encoding the same name twice yields two
    /// different aliases that both decode to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AliasError::NonceExhausted`] once the counter is used up.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use minedive_core::AliasCodec;
    ///
    /// let mut codec = AliasCodec::generate();
    /// let alias = codec.encode("alice").unwrap();
    /// assert_ne!(alias, "alice");
    /// assert_eq!(codec.decode(&alias).unwrap(), "alice");
    /// ```
    pub fn encode(&mut self, name: &str) -> Result<String, AliasError> {
        encode_alias(name, &self.key, &mut self.nonce)
    }

    /// Recovers the name behind an alias issued by this codec.
    ///
    /// # Errors
    ///
    /// Returns [`AliasError::InvalidAlias`] for tampered or foreign tokens.
    pub fn decode(&self, alias: &str) -> Result<String, AliasError> {
        decode_alias(alias, &self.key)
    }

    /// Returns `true` once no further aliases can be produced.
    pub fn is_exhausted(&self) -> bool {
        self.nonce.is_exhausted()
    }
}

impl fmt::Debug for AliasCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliasCodec")
            .field("key", &"<redacted>")
            .field("nonce", &self.nonce)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_codec(counter_start: u8, width: usize) -> AliasCodec {
        let mut initial = [0x5Au8; NONCE_LEN];
        initial[NONCE_LEN - 1] = counter_start;
        AliasCodec::from_parts([0x42; KEY_LEN], NonceCounter::new(initial, width))
    }

    #[test]
    fn test_encode_then_decode_returns_name() {
        // Arrange
        let mut codec = AliasCodec::generate();

        // Act
        let alias = codec.encode("bob").unwrap();

        // Assert
        assert_eq!(codec.decode(&alias).unwrap(), "bob");
    }

    #[test]
    fn test_alias_does_not_contain_raw_name() {
        let mut codec = AliasCodec::generate();
        let alias = codec.encode("bob").unwrap();
        assert!(!alias.contains("bob"));
    }

    #[test]
    fn test_same_name_encodes_to_different_aliases() {
        let mut codec = fixed_codec(0, COUNTER_WIDTH);
        let first = codec.encode("carol").unwrap();
        let second = codec.encode("carol").unwrap();
        assert_ne!(first, second, "each encode must use a fresh nonce");
    }

    #[test]
    fn test_alias_carries_advanced_nonce_prefix() {
        // Arrange – the counter starts at 0x10, so the first alias uses 0x11
        let mut codec = fixed_codec(0x10, COUNTER_WIDTH);

        // Act
        let alias = codec.encode("dave").unwrap();
        let raw = STANDARD.decode(alias).unwrap();

        // Assert
        assert_eq!(raw[NONCE_LEN - 1], 0x11);
        assert_eq!(raw.len(), NONCE_LEN + "dave".len() + 16);
    }

    #[test]
    fn test_decode_with_other_key_fails() {
        let mut issuer = AliasCodec::generate();
        let other = AliasCodec::generate();
        let alias = issuer.encode("erin").unwrap();
        assert_eq!(
            other.decode(&alias),
            Err(AliasError::InvalidAlias("authentication failed"))
        );
    }

    #[test]
    fn test_decode_rejects_non_base64() {
        let codec = AliasCodec::generate();
        assert_eq!(
            codec.decode("not base64 at all!"),
            Err(AliasError::InvalidAlias("not base64"))
        );
    }

    #[test]
    fn test_decode_rejects_buffer_shorter_than_nonce() {
        let codec = AliasCodec::generate();
        let short = STANDARD.encode([0u8; NONCE_LEN - 1]);
        assert_eq!(
            codec.decode(&short),
            Err(AliasError::InvalidAlias("shorter than nonce"))
        );
    }

    #[test]
    fn test_encode_reports_nonce_exhaustion() {
        // Arrange – one-byte counter already at 0xFF
        let mut codec = fixed_codec(0xFF, 1);

        // Act
        let result = codec.encode("frank");

        // Assert
        assert_eq!(result, Err(AliasError::NonceExhausted));
        assert!(codec.is_exhausted());
        assert_eq!(codec.encode("frank"), Err(AliasError::NonceExhausted));
    }

    #[test]
    fn test_encode_alias_free_function_matches_codec() {
        let key = [9u8; KEY_LEN];
        let mut nonce = NonceCounter::new([0u8; NONCE_LEN], 4);
        let alias = encode_alias("grace", &key, &mut nonce).unwrap();
        assert_eq!(decode_alias(&alias, &key).unwrap(), "grace");
        assert_eq!(nonce.current()[NONCE_LEN - 1], 1);
    }

    #[test]
    fn test_empty_name_round_trips() {
        let mut codec = AliasCodec::generate();
        let alias = codec.encode("").unwrap();
        assert_eq!(codec.decode(&alias).unwrap(), "");
    }

    #[test]
    fn test_debug_output_redacts_key() {
        let codec = fixed_codec(0, 8);
        let text = format!("{codec:?}");
        assert!(text.contains("<redacted>"));
        assert!(!text.contains("66"), "raw key bytes (0x42 = 66) must not be printed");
    }
}
