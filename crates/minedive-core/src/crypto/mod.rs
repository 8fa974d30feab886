//! Cryptographic helpers.
//!
//! Only one primitive lives here: the alias codec, which hides a client's
//! chosen name behind a token that only the issuing server can open.

pub mod alias;

pub use alias::{decode_alias, encode_alias, AliasCodec, AliasError, COUNTER_WIDTH, KEY_LEN};
