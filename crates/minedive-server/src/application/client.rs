//! Per-connection client state.
//!
//! A [`Client`] is owned by its session task and never shared.  It holds the
//! connection's [`AliasCodec`], so the secret key and nonce stay inside one
//! task for the connection's whole life.  The registry only sees the public
//! projection ([`PeerRecord`](crate::application::PeerRecord)).

use std::net::SocketAddr;

use minedive_core::{AliasCodec, ErrorKind, ServerMsg};

use crate::application::error::SignalError;
use crate::application::handle::ConnectionHandle;
use crate::domain::{ClientId, ClientState, PublicKey};

/// One live connection, as seen by its own session task.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    name: String,
    public_key: Option<PublicKey>,
    state: ClientState,
    remote_addr: SocketAddr,
    codec: AliasCodec,
    handle: ConnectionHandle,
}

impl Client {
    /// Creates a client in the `Connecting` state with fresh secret material.
    pub fn new(id: ClientId, remote_addr: SocketAddr, handle: ConnectionHandle) -> Self {
        Self::with_codec(id, remote_addr, handle, AliasCodec::generate())
    }

    /// Creates a client around an explicit codec.
    pub fn with_codec(
        id: ClientId,
        remote_addr: SocketAddr,
        handle: ConnectionHandle,
        codec: AliasCodec,
    ) -> Self {
        Self {
            id,
            name: String::new(),
            public_key: None,
            state: ClientState::Connecting,
            remote_addr,
            codec,
            handle,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Display name; empty until `username` arrives.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub(crate) fn codec(&self) -> &AliasCodec {
        &self.codec
    }

    /// Records the name and key from a `username` message.
    ///
    /// # Errors
    ///
    /// [`SignalError::AlreadyIdentified`] unless the client is still
    /// `Connecting`.
    pub fn identify(&mut self, name: String, public_key: PublicKey) -> Result<(), SignalError> {
        if self.state != ClientState::Connecting {
            return Err(SignalError::AlreadyIdentified);
        }
        self.name = name;
        self.public_key = Some(public_key);
        self.state = ClientState::Identified;
        Ok(())
    }

    /// Checks that signaling is allowed and moves an `Identified` client to
    /// `Active`.
    ///
    /// # Errors
    ///
    /// [`SignalError::NotIdentified`] before `username`.
    pub fn begin_signaling(&mut self) -> Result<(), SignalError> {
        if !self.state.permits_signaling() {
            return Err(SignalError::NotIdentified);
        }
        self.state = ClientState::Active;
        Ok(())
    }

    /// Marks the connection as finished.
    pub fn close(&mut self) {
        self.state = ClientState::Closed;
    }

    /// Produces an alias for `name` under this client's key.
    ///
    /// # Errors
    ///
    /// [`SignalError::NonceExhausted`] once the nonce counter is used up.
    pub fn alias_for(&mut self, name: &str) -> Result<String, SignalError> {
        Ok(self.codec.encode(name)?)
    }

    /// Queues a text frame on this client's own connection.
    pub async fn send_text(&self, text: String) -> Result<(), SignalError> {
        self.handle.send_text(text).await
    }

    /// Queues a server message on this client's own connection.
    pub async fn send_msg(&self, msg: &ServerMsg) -> Result<(), SignalError> {
        self.handle.send_msg(msg).await
    }

    /// Sends an `error` frame describing `err` back to this client.
    pub async fn report(
        &self,
        kind: ErrorKind,
        request: &str,
        err: &SignalError,
    ) -> Result<(), SignalError> {
        self.send_msg(&ServerMsg::Error {
            kind,
            request: request.to_string(),
            message: err.to_string(),
        })
        .await
    }
}
