//! Domain layer for minedive-server.
//!
//! Pure types with no dependency on sockets, tokio, or the environment.
//!
//! - [`ServerConfig`]: every runtime setting, built once at startup.
//! - [`ClientId`], [`PublicKey`], [`ClientState`]: the identity of one
//!   connection and where it is in its lifecycle.

pub mod client;
pub mod config;

pub use client::{ClientId, ClientState, PublicKey, PublicKeyError, PUBLIC_KEY_LEN};
pub use config::ServerConfig;
