//! minedive-server library crate.
//!
//! A WebRTC signaling relay.  Browsers connect over WebSocket, announce a
//! display name and public key, list each other through opaque aliases, and
//! exchange SDP offers/answers.  No media passes through the server.
//!
//! # Architecture
//!
//! ```text
//! Browser (JSON over WebSocket, optionally TLS)
//!         ↕
//! [minedive-server]
//!   ├── domain/           Pure types: ServerConfig, ClientId, PublicKey, ClientState
//!   ├── application/      Registry, dispatcher and signaling router
//!   └── infrastructure/
//!         ├── ws_server/  Accept loop and per-connection session (tokio-tungstenite)
//!         └── tls/        rustls acceptor from cert.pem / privkey.pem
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain`, `minedive-core` and tokio channels;
//!   it never touches a socket, so it is tested with plain queues.
//! - `infrastructure` owns the sockets and wires everything together.

/// Domain layer: configuration and client identity types (no I/O).
pub mod domain;

/// Application layer: client registry, message dispatch and routing.
pub mod application;

/// Infrastructure layer: WebSocket server and TLS loading.
pub mod infrastructure;
