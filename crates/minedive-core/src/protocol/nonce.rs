//! Fixed-width nonce counter for the alias codec.
//!
//! Every alias encode advances the counter first.  A nonce must never repeat
//! under the same key, so when the counter space runs out the codec refuses
//! to encrypt instead of starting over.
//!
//! # Layout
//!
//! The nonce is a 24-byte buffer.  The last `width` bytes are treated as a
//! big-endian integer and incremented with carry; the leading bytes are left
//! untouched, so they can hold a random prefix.
//!
//! ```text
//! [ fixed prefix (24 - width bytes) ][ counter (width bytes, big-endian) ]
//! ```

use thiserror::Error;

/// Length of an XChaCha20-Poly1305 nonce in bytes.
pub const NONCE_LEN: usize = 24;

/// Errors raised by the nonce counter.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NonceError {
    /// Every counter byte wrapped back to zero.  Continuing would reuse a
    /// nonce under the same key.
    #[error("nonce counter exhausted")]
    Exhausted,
}

/// Increments the last `width` bytes of `buf` as a big-endian counter.
///
/// `width` is clamped to `buf.len()`.  Each byte that is already `0xFF` wraps
/// to `0x00` and carries into the next more-significant byte.  When the carry
/// runs past the most-significant counter byte the buffer has wrapped to all
/// zeroes and [`NonceError::Exhausted`] is returned.
///
/// # Examples
///
/// ```rust
/// use minedive_core::protocol::nonce::{increment, NonceError};
///
/// let mut buf = [0x00, 0x00, 0xFF];
/// increment(&mut buf, 2).unwrap();
/// assert_eq!(buf, [0x00, 0x01, 0x00]);
///
/// let mut full = [0xAA, 0xFF, 0xFF];
/// assert_eq!(increment(&mut full, 2), Err(NonceError::Exhausted));
/// assert_eq!(full, [0xAA, 0x00, 0x00]);
/// ```
pub fn increment(buf: &mut [u8], width: usize) -> Result<(), NonceError> {
    let len = buf.len();
    let width = width.min(len);

    for byte in buf[len - width..].iter_mut().rev() {
        if *byte < 0xFF {
            *byte += 1;
            return Ok(());
        }
        *byte = 0;
    }

    Err(NonceError::Exhausted)
}

/// A 24-byte nonce with a big-endian counter in its trailing bytes.
///
/// Exhaustion is sticky: once [`advance`](Self::advance) has reported
/// [`NonceError::Exhausted`], every later call fails too, because the buffer
/// has wrapped to a value that was already handed out.
#[derive(Debug, Clone)]
pub struct NonceCounter {
    bytes: [u8; NONCE_LEN],
    width: usize,
    exhausted: bool,
}

impl NonceCounter {
    /// Creates a counter over the last `width` bytes of `initial`.
    ///
    /// `width` is clamped to [`NONCE_LEN`].
    pub fn new(initial: [u8; NONCE_LEN], width: usize) -> Self {
        Self {
            bytes: initial,
            width: width.min(NONCE_LEN),
            exhausted: false,
        }
    }

    /// Advances the counter by one and returns the new nonce value.
    ///
    /// # Errors
    ///
    /// Returns [`NonceError::Exhausted`] when the counter space is used up.
    pub fn advance(&mut self) -> Result<[u8; NONCE_LEN], NonceError> {
        if self.exhausted {
            return Err(NonceError::Exhausted);
        }
        if let Err(e) = increment(&mut self.bytes, self.width) {
            self.exhausted = true;
            return Err(e);
        }
        Ok(self.bytes)
    }

    /// Returns the most recently issued nonce without advancing.
    pub fn current(&self) -> &[u8; NONCE_LEN] {
        &self.bytes
    }

    /// Returns `true` once the counter has reported exhaustion.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of trailing bytes used as the counter.
    pub fn width(&self) -> usize {
        self.width
    }
}
