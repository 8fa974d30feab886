//! Message dispatcher: decodes one inbound frame and acts on it.
//!
//! Decoding is two-step:
//!
//! 1. The envelope (`{"type": ...}`).  If that fails the frame is not a
//!    protocol message; it is logged and dropped, and the sender hears
//!    nothing.
//! 2. The type-specific payload.  If that fails the sender gets an `error`
//!    frame of kind `malformed_payload`.
//!
//! In both cases the session continues.  Only fatal errors (see
//! [`SignalError::is_fatal`]) are returned to the caller, which then ends the
//! session.

use std::sync::Arc;

use minedive_core::protocol::messages::{
    pong_reply, Envelope, KeyRequest, SignalMsg, UsernameMsg,
};
use minedive_core::MessageKind;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::application::client::Client;
use crate::application::error::SignalError;
use crate::application::registry::Registry;
use crate::application::router::SignalingRouter;
use crate::domain::{ClientState, PublicKey};

/// Reads the `"type"` of a frame.
///
/// # Errors
///
/// [`SignalError::MalformedEnvelope`] if the frame is not a JSON object with a
/// string `"type"` field.
pub fn parse_envelope(frame: &str) -> Result<MessageKind, SignalError> {
    let envelope =
        Envelope::from_frame(frame).map_err(|e| SignalError::MalformedEnvelope(e.to_string()))?;
    Ok(MessageKind::from_type(&envelope.msg_type))
}

/// Decodes the payload of a frame whose type is already known.
fn decode_payload<T: DeserializeOwned>(kind: &MessageKind, frame: &str) -> Result<T, SignalError> {
    serde_json::from_str(frame).map_err(|e| SignalError::malformed(kind.as_str(), e))
}

/// Routes inbound frames for every session of one server.
pub struct Dispatcher {
    registry: Arc<Registry>,
    router: SignalingRouter,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        let router = SignalingRouter::new(Arc::clone(&registry));
        Self { registry, router }
    }

    /// Handles one text frame from `client`.
    ///
    /// Recoverable errors are reported to the client as `error` frames and
    /// swallowed.
    ///
    /// # Errors
    ///
    /// Returns the error only when the session must end: the client's nonce
    /// is exhausted (after telling the client so) or its own outbound queue
    /// is gone.
    pub async fn dispatch(&self, client: &mut Client, frame: &str) -> Result<(), SignalError> {
        let kind = match parse_envelope(frame) {
            Ok(kind) => kind,
            Err(e) => {
                warn!(client = client.id(), "dropping frame: {e}");
                return Ok(());
            }
        };

        debug!(client = client.id(), "received {}", kind.as_str());

        let Err(err) = self.handle(client, &kind, frame).await else {
            return Ok(());
        };

        match err.reply_kind() {
            Some(reply) => {
                debug!(client = client.id(), "{} failed: {err}", kind.as_str());
                // A failed report means our own queue is gone; that is fatal too.
                client.report(reply, kind.as_str(), &err).await?;
            }
            None => warn!(client = client.id(), "{} failed: {err}", kind.as_str()),
        }

        if err.is_fatal() {
            return Err(err);
        }
        Ok(())
    }

    async fn handle(
        &self,
        client: &mut Client,
        kind: &MessageKind,
        frame: &str,
    ) -> Result<(), SignalError> {
        match kind {
            MessageKind::Username => {
                let msg: UsernameMsg = decode_payload(kind, frame)?;
                self.identify(client, msg).await
            }
            MessageKind::Ping => {
                let pong = pong_reply(frame).map_err(|e| SignalError::malformed("ping", e))?;
                client.send_text(pong).await
            }
            MessageKind::GetKey => {
                client.begin_signaling()?;
                let request: KeyRequest = decode_payload(kind, frame)?;
                self.router.send_key(client, &request).await
            }
            MessageKind::GetPeers => {
                client.begin_signaling()?;
                self.router.send_peers(client).await
            }
            MessageKind::Offer | MessageKind::Answer => {
                client.begin_signaling()?;
                let msg: SignalMsg = decode_payload(kind, frame)?;
                self.router.forward_to_target(client, &msg, frame).await
            }
            MessageKind::Message | MessageKind::GetAlias => {
                debug!(client = client.id(), "{} is not handled", kind.as_str());
                Ok(())
            }
            MessageKind::Unknown(other) => {
                warn!(client = client.id(), "unknown message type {other:?}");
                Ok(())
            }
        }
    }

    async fn identify(&self, client: &mut Client, msg: UsernameMsg) -> Result<(), SignalError> {
        if client.state() != ClientState::Connecting {
            return Err(SignalError::AlreadyIdentified);
        }
        let public_key =
            PublicKey::from_base64(&msg.pk).map_err(|e| SignalError::malformed("username", e))?;

        // The registry claims the name first; a taken name leaves the client
        // in `Connecting` so it can retry with another one.
        self.registry
            .set_identity(client.id(), msg.name.clone(), public_key)
            .await?;
        client.identify(msg.name, public_key)?;

        info!(
            client = client.id(),
            addr = %client.remote_addr(),
            pk = ?client.public_key(),
            "client identified as {:?}",
            client.name()
        );
        Ok(())
    }
}
