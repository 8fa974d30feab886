//! minedive signaling server: entry point.
//!
//! Browsers connect over WebSocket (TLS by default), announce a name and a
//! public key, discover each other through per-requester aliases, and relay
//! WebRTC offers and answers through this process.
//!
//! # Usage
//!
//! ```text
//! minedive-server [OPTIONS]
//!
//! Options:
//!   --port <PORT>                 Listener port [default: 6501]
//!   --bind <ADDR>                 Listener IP address [default: 0.0.0.0]
//!   -d, --cert-dir <DIR>          Directory with cert.pem and privkey.pem [default: .]
//!   --plain-http                  Serve ws:// instead of wss://
//!   --allowed-origin <ORIGIN>     Accept upgrades only from this Origin (repeatable)
//!   --handshake-timeout <SECS>    TLS + WebSocket handshake limit [default: 20]
//!   --outbound-queue <FRAMES>     Per-connection outbound queue size [default: 128]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                     | Default   |
//! |------------------------------|-----------|
//! | `MINEDIVE_PORT`              | `6501`    |
//! | `MINEDIVE_BIND`              | `0.0.0.0` |
//! | `MINEDIVE_CERT_DIR`          | `.`       |
//! | `MINEDIVE_PLAIN_HTTP`        | `false`   |
//! | `MINEDIVE_ALLOWED_ORIGINS`   | (any)     |
//! | `MINEDIVE_HANDSHAKE_TIMEOUT` | `20`      |
//! | `MINEDIVE_OUTBOUND_QUEUE`    | `128`     |
//!
//! `RUST_LOG` controls log verbosity (default `info`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use minedive_server::domain::ServerConfig;
use minedive_server::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// WebRTC signaling relay.
#[derive(Debug, Parser)]
#[command(
    name = "minedive-server",
    about = "WebRTC signaling relay: peer discovery and offer/answer forwarding over WebSocket",
    version
)]
struct Cli {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 6501, env = "MINEDIVE_PORT")]
    port: u16,

    /// IP address to bind to.
    ///
    /// `0.0.0.0` accepts connections on every interface, `127.0.0.1` only
    /// local ones.
    #[arg(long, default_value = "0.0.0.0", env = "MINEDIVE_BIND")]
    bind: String,

    /// Directory containing `cert.pem` and `privkey.pem`.
    #[arg(short = 'd', long, default_value = ".", env = "MINEDIVE_CERT_DIR")]
    cert_dir: PathBuf,

    /// Serve plain `ws://` without TLS (for use behind a TLS proxy).
    #[arg(long, env = "MINEDIVE_PLAIN_HTTP")]
    plain_http: bool,

    /// Origin allowed to open a WebSocket; repeat for several.
    ///
    /// When none is given, any origin is accepted.
    #[arg(
        long = "allowed-origin",
        env = "MINEDIVE_ALLOWED_ORIGINS",
        value_delimiter = ','
    )]
    allowed_origins: Vec<String>,

    /// Seconds allowed for the TLS and WebSocket handshakes.
    #[arg(long, default_value_t = 20, env = "MINEDIVE_HANDSHAKE_TIMEOUT")]
    handshake_timeout: u64,

    /// Frames each connection may have queued before forwards to it are
    /// refused with `busy`.
    #[arg(long, default_value_t = 128, env = "MINEDIVE_OUTBOUND_QUEUE")]
    outbound_queue: usize,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not a valid IP address or
    /// `--outbound-queue` is zero.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse::<SocketAddr>()
            .or_else(|_| format!("[{}]:{}", self.bind, self.port).parse::<SocketAddr>())
            .with_context(|| format!("invalid bind address: '{}' port {}", self.bind, self.port))?;

        anyhow::ensure!(self.outbound_queue > 0, "--outbound-queue must be at least 1");

        Ok(ServerConfig {
            bind_addr,
            cert_dir: self.cert_dir,
            plain_http: self.plain_http,
            allowed_origins: self.allowed_origins,
            handshake_timeout: Duration::from_secs(self.handshake_timeout),
            outbound_queue: self.outbound_queue,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;

    info!(
        "minedive signaling server starting: bind={}, tls={}",
        config.bind_addr, !config.plain_http
    );

    // Cleared by Ctrl+C; the accept loop polls it every 200 ms.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("minedive signaling server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
