//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! `main.rs` builds it from CLI arguments; tests build it directly or start
//! from [`ServerConfig::default`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// All runtime configuration for the signaling server.
///
/// # Example
///
/// ```rust
/// use minedive_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 6501);
/// assert!(!cfg.plain_http);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address and port the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Directory holding `cert.pem` and `privkey.pem`.
    ///
    /// Ignored when `plain_http` is set.
    pub cert_dir: PathBuf,

    /// Serve plain `ws://` instead of `wss://`.
    pub plain_http: bool,

    /// Origins allowed to open a WebSocket.  Empty accepts any origin.
    pub allowed_origins: Vec<String>,

    /// Upper bound on the TLS + WebSocket upgrade handshake.
    pub handshake_timeout: Duration,

    /// Capacity of each connection's outbound frame queue.
    ///
    /// Must be at least 1.
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    /// | Field             | Default        |
    /// |-------------------|----------------|
    /// | bind_addr         | `0.0.0.0:6501` |
    /// | cert_dir          | `.`            |
    /// | plain_http        | `false`        |
    /// | allowed_origins   | empty          |
    /// | handshake_timeout | 20 seconds     |
    /// | outbound_queue    | 128            |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 6501)),
            cert_dir: PathBuf::from("."),
            plain_http: false,
            allowed_origins: Vec::new(),
            handshake_timeout: Duration::from_secs(20),
            outbound_queue: 128,
        }
    }
}

impl ServerConfig {
    /// Returns `true` if a WebSocket upgrade carrying `origin` may proceed.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        origin.is_some_and(|o| self.allowed_origins.iter().any(|allowed| allowed == o))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
