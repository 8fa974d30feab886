//! Per-connection outbound queue.
//!
//! Every connection has exactly one writer: a task that drains this queue onto
//! the WebSocket.  Replies from the connection's own task and frames forwarded
//! by other connections' tasks both go through the queue, so writes to one
//! socket are serialized without a lock around the sink.

use minedive_core::ServerMsg;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::application::error::SignalError;
use crate::domain::ClientId;

/// Cloneable sending side of a connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ClientId,
    tx: mpsc::Sender<String>,
}

impl ConnectionHandle {
    /// Creates a queue of `capacity` frames for connection `id`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a tokio `mpsc` requirement).
    pub fn channel(id: ClientId, capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { id, tx }, rx)
    }

    /// Queues a text frame, waiting for room if the queue is full.
    ///
    /// Used for replies on the connection's own queue.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::TransportClosed`] once the writer has gone.
    pub async fn send_text(&self, text: String) -> Result<(), SignalError> {
        self.tx
            .send(text)
            .await
            .map_err(|_| SignalError::TransportClosed)
    }

    /// Serializes and queues a server message.
    ///
    /// # Errors
    ///
    /// [`SignalError::Encode`] if serialization fails, otherwise as
    /// [`send_text`](Self::send_text).
    pub async fn send_msg(&self, msg: &ServerMsg) -> Result<(), SignalError> {
        let text = msg
            .to_json()
            .map_err(|e| SignalError::Encode(e.to_string()))?;
        self.send_text(text).await
    }

    /// Queues a frame without waiting.
    ///
    /// Used when one connection writes to another: a slow peer must not stall
    /// the sender's receive loop.
    ///
    /// # Errors
    ///
    /// - [`SignalError::QueueFull`] if the target is not keeping up.
    /// - [`SignalError::TransportClosed`] if the target's writer has gone.
    pub fn try_send_text(&self, text: String) -> Result<(), SignalError> {
        self.tx.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => SignalError::QueueFull(self.id),
            TrySendError::Closed(_) => SignalError::TransportClosed,
        })
    }
}
