//! Infrastructure layer for minedive-server.
//!
//! The infrastructure layer handles all I/O: TLS termination, the WebSocket
//! upgrade, and the per-connection read and write loops.
//!
//! # Responsibilities
//!
//! - Loading the certificate chain and private key
//! - Binding the listener and accepting connections
//! - Performing the WebSocket HTTP upgrade handshake (with origin check)
//! - Spawning per-connection Tokio tasks
//! - Handling the graceful shutdown signal
//!
//! # What does NOT belong here?
//!
//! - Message routing (that is the application layer)
//! - Configuration parsing (that is done in `main.rs`)

pub mod tls;
pub mod ws_server;

pub use ws_server::{run_server, serve};
