//! WebSocket server: accept loop and per-connection sessions.
//!
//! This module is responsible for:
//!
//! 1. Loading the TLS acceptor (unless `plain_http` is set) and binding the
//!    TCP listener.
//! 2. Accepting connections and spawning one Tokio task per connection.
//! 3. Completing the TLS and WebSocket handshakes within
//!    `handshake_timeout`, rejecting disallowed origins with HTTP 403.
//! 4. Running the session: announce the id, register the client, feed every
//!    inbound frame to the [`Dispatcher`], and drain the outbound queue onto
//!    the socket from a dedicated writer task.
//! 5. Removing the client from the [`Registry`] exactly once when the session
//!    ends, whichever side ended it.
//!
//! # Session shape
//!
//! ```text
//!            ┌──────────── receive loop ────────────┐
//! socket ──► │ Text/Binary ─► Dispatcher::dispatch  │
//!            └──────────────────────────────────────┘
//!                        │ replies        ▲ forwards from other sessions
//!                        ▼                │
//!               outbound mpsc queue (ConnectionHandle)
//!                        │
//!            writer task ▼ ──► socket
//! ```

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{anyhow, Context};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use minedive_core::ServerMsg;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::application::{Client, ConnectionHandle, Dispatcher, PeerRecord, Registry};
use crate::domain::{ClientId, ServerConfig};
use crate::infrastructure::tls::load_acceptor;

/// How often the accept loop wakes up to check the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Loads TLS material, binds the listener and serves until `running` is
/// cleared.
///
/// # Errors
///
/// Returns an error if the certificate or key cannot be loaded, or the
/// listener cannot be bound.
pub async fn run_server(config: ServerConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let tls = if config.plain_http {
        None
    } else {
        Some(load_acceptor(&config.cert_dir)?)
    };

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;

    info!(
        "signaling server listening on {}://{}",
        if tls.is_some() { "wss" } else { "ws" },
        config.bind_addr
    );

    serve(listener, config, Arc::new(Registry::new()), tls, running).await
}

/// Runs the accept loop on an already bound listener.
///
/// Split from [`run_server`] so tests can bind port 0 and inspect the
/// registry.
///
/// # Errors
///
/// Accept failures are logged, not returned; the `Result` is kept for
/// symmetry with [`run_server`].
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    registry: Arc<Registry>,
    tls: Option<TlsAcceptor>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    // Shared read-only by every session task.
    let config = Arc::new(config);
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry)));

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Bounded wait so a quiet listener still notices the shutdown flag.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("accepted TCP connection from {peer_addr}");
                let session = Session {
                    peer_addr,
                    config: Arc::clone(&config),
                    registry: Arc::clone(&registry),
                    dispatcher: Arc::clone(&dispatcher),
                };
                // One task per connection; a slow handshake blocks only itself.
                let tls = tls.clone();
                tokio::spawn(async move {
                    handle_connection(stream, tls, session).await;
                });
            }
            Ok(Err(e)) => {
                // Transient (e.g. out of file descriptors); keep serving.
                error!("accept error: {e}");
            }
            // Poll interval elapsed with no connection.
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-connection handling ───────────────────────────────────────────────────

/// Everything a session task needs besides its socket.
struct Session {
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
}

/// Entry point of each per-connection task: finishes TLS if configured, runs
/// the session and logs how it ended.
async fn handle_connection(stream: TcpStream, tls: Option<TlsAcceptor>, session: Session) {
    let peer_addr = session.peer_addr;

    let result = match tls {
        Some(acceptor) => {
            match timeout(session.config.handshake_timeout, acceptor.accept(stream)).await {
                Ok(Ok(tls_stream)) => run_session(tls_stream, session).await,
                Ok(Err(e)) => Err(anyhow!(e).context(format!("TLS handshake failed with {peer_addr}"))),
                Err(_) => Err(anyhow!("TLS handshake with {peer_addr} timed out")),
            }
        }
        None => run_session(stream, session).await,
    };

    if let Err(e) = result {
        warn!("session {peer_addr} ended with error: {e:#}");
    }
}

/// Runs one WebSocket session over an established (plain or TLS) stream.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails or times out, the
/// client's transport fails, or a fatal signaling error ends the session.
async fn run_session<S>(stream: S, session: Session) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Session {
        peer_addr,
        config,
        registry,
        dispatcher,
    } = session;

    // ── Step 1: WebSocket upgrade, with the origin check ──────────────────────
    //
    // The callback sees the upgrade request before the 101 goes out; returning
    // an ErrorResponse answers 403 and no session starts.
    let origin_check = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let origin = req
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok());
        if config.origin_allowed(origin) {
            Ok(resp)
        } else {
            warn!("rejecting {peer_addr}: origin {origin:?} not allowed");
            let mut rejection = ErrorResponse::new(Some("origin not allowed".to_string()));
            *rejection.status_mut() = StatusCode::FORBIDDEN;
            Err(rejection)
        }
    };

    let ws_stream = timeout(config.handshake_timeout, accept_hdr_async(stream, origin_check))
        .await
        .map_err(|_| anyhow!("WebSocket handshake with {peer_addr} timed out"))?
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    // ── Step 2: id, outbound queue, registration ──────────────────────────────
    // The sink goes to the writer task, the stream stays with the receive loop.
    let (ws_tx, ws_rx) = ws_stream.split();

    let id = registry.next_id();
    let (handle, outbound) = ConnectionHandle::channel(id, config.outbound_queue);
    let mut client = Client::new(id, peer_addr, handle.clone());

    // Queued before registering, so the id is the first frame the client sees.
    client
        .send_msg(&ServerMsg::Id { id })
        .await
        .context("outbound queue closed before the session started")?;
    registry
        .register(PeerRecord::new(id, peer_addr, handle))
        .await;

    info!(client = id, "client connected from {peer_addr}");

    // ── Step 3: writer task + receive loop ────────────────────────────────────
    let mut writer = tokio::spawn(write_frames(ws_tx, outbound, id));

    // Whichever side finishes first ends the session.  `&mut writer` leaves
    // the task handle usable for teardown; the receive loop future is dropped.
    let result = tokio::select! {
        result = receive_loop(ws_rx, &mut client, &dispatcher) => result,
        _ = &mut writer => {
            debug!(client = id, "writer ended first");
            Ok(())
        }
    };

    // ── Step 4: teardown ──────────────────────────────────────────────────────
    //
    // Dropping the client and the registry entry drops the last queue senders,
    // so the writer flushes what is left (e.g. an alias_unavailable error),
    // sends a Close frame and exits.
    client.close();
    drop(client);
    registry.unregister(id).await;

    // Bounded wait for the Close frame to go out.
    if !writer.is_finished()
        && timeout(config.handshake_timeout, &mut writer).await.is_err()
    {
        debug!(client = id, "writer did not drain in time; aborting");
        writer.abort();
    }

    info!(client = id, "client {peer_addr} disconnected");
    // Remaining clients, for operators tracing who is still online.
    for (live_id, name, addr) in registry.snapshot().await {
        debug!(client = live_id, "registry: {name:?} at {addr}");
    }

    result
}

/// Drains the outbound queue onto the socket until every sender is gone or a
/// write fails.
async fn write_frames<S>(
    mut sink: SplitSink<WebSocketStream<S>, WsMessage>,
    mut outbound: mpsc::Receiver<String>,
    id: ClientId,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // `None` once the client and its registry record are both dropped.
    while let Some(text) = outbound.recv().await {
        if let Err(e) = sink.send(WsMessage::Text(text)).await {
            debug!(client = id, "write failed (peer gone): {e}");
            return;
        }
    }
    if let Err(e) = sink.close().await {
        debug!(client = id, "close failed: {e}");
    }
}

/// Reads frames until the peer closes the connection or a fatal error
/// occurs.
async fn receive_loop<S>(
    mut ws_rx: SplitStream<WebSocketStream<S>>,
    client: &mut Client,
    dispatcher: &Dispatcher,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = client.id();

    loop {
        let frame = match ws_rx.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) | None => {
                debug!(client = id, "stream ended");
                return Ok(());
            }
            Some(Err(e)) => {
                return Err(anyhow!(e).context(format!("client {id}: read failed")));
            }
        };

        // Browsers may send JSON as binary; treat valid UTF-8 the same as text.
        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Binary(data) => match String::from_utf8(data) {
                Ok(text) => text,
                Err(_) => {
                    warn!(client = id, "dropping non-UTF-8 binary frame");
                    continue;
                }
            },
            WsMessage::Close(_) => {
                debug!(client = id, "Close frame received");
                return Ok(());
            }
            // Control frames are answered by tungstenite itself.
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
        };

        // Recoverable errors were already reported to the client; only fatal
        // ones surface here.
        dispatcher
            .dispatch(client, &text)
            .await
            .with_context(|| format!("client {id}: session terminated"))?;
    }
}
