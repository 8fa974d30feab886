//! Protocol module containing the JSON message types and the nonce counter.

pub mod messages;
pub mod nonce;

pub use messages::*;
pub use nonce::{NonceCounter, NonceError, NONCE_LEN};
