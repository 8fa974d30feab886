//! Error taxonomy for per-message handling.
//!
//! None of these errors ever leaves the connection that caused it.  The
//! dispatcher turns the recoverable ones into an `error` frame for the sender
//! and keeps the session running; only [`SignalError::is_fatal`] errors end
//! the session.

use minedive_core::{AliasError, ErrorKind};
use thiserror::Error;

use crate::domain::ClientId;

/// Errors that can occur while handling one inbound frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    /// The frame is not a JSON object with a string `"type"`.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The frame has a known `"type"` but its fields do not fit.
    #[error("malformed {msg_type} payload: {reason}")]
    MalformedPayload { msg_type: String, reason: String },

    /// The named target is not connected (or has no public key yet).
    #[error("target not found: {0}")]
    NotFound(String),

    /// Signaling requested before the client sent `username`.
    #[error("client has not sent its username yet")]
    NotIdentified,

    /// A second `username` on the same connection.
    #[error("client is already identified")]
    AlreadyIdentified,

    /// Another connected client already uses this name.
    #[error("name {0:?} is already in use")]
    NameTaken(String),

    /// The target's outbound queue is full.
    #[error("outbound queue of client {0} is full")]
    QueueFull(ClientId),

    /// This connection cannot produce any more aliases.
    #[error("alias nonce exhausted")]
    NonceExhausted,

    /// The AEAD refused to seal an alias.
    #[error("alias encryption failed")]
    AliasFailure,

    /// A reply could not be serialized.
    #[error("failed to encode reply: {0}")]
    Encode(String),

    /// The connection's own outbound queue is gone.
    #[error("transport closed")]
    TransportClosed,
}

impl SignalError {
    /// Shorthand for a [`SignalError::MalformedPayload`].
    pub fn malformed(msg_type: &str, reason: impl ToString) -> Self {
        SignalError::MalformedPayload {
            msg_type: msg_type.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The `kind` of the `error` frame sent back to the client, if any.
    pub fn reply_kind(&self) -> Option<ErrorKind> {
        match self {
            SignalError::MalformedPayload { .. } => Some(ErrorKind::MalformedPayload),
            SignalError::NotFound(_) => Some(ErrorKind::NotFound),
            SignalError::NotIdentified => Some(ErrorKind::NotIdentified),
            SignalError::AlreadyIdentified => Some(ErrorKind::AlreadyIdentified),
            SignalError::NameTaken(_) => Some(ErrorKind::NameTaken),
            SignalError::QueueFull(_) => Some(ErrorKind::Busy),
            SignalError::NonceExhausted | SignalError::AliasFailure => {
                Some(ErrorKind::AliasUnavailable)
            }
            SignalError::MalformedEnvelope(_)
            | SignalError::Encode(_)
            | SignalError::TransportClosed => None,
        }
    }

    /// Whether the session must end after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SignalError::NonceExhausted | SignalError::AliasFailure | SignalError::TransportClosed
        )
    }
}

impl From<AliasError> for SignalError {
    fn from(err: AliasError) -> Self {
        match err {
            // An alias we cannot open names nobody we know.
            AliasError::InvalidAlias(reason) => SignalError::NotFound(format!("alias ({reason})")),
            AliasError::NonceExhausted => SignalError::NonceExhausted,
            AliasError::Seal => SignalError::AliasFailure,
        }
    }
}
