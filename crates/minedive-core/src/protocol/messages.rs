//! JSON message types for the signaling protocol.
//!
//! Every frame is a JSON object with a `"type"` field.  Decoding happens in
//! two steps:
//!
//! 1. [`Envelope`] reads only the `"type"` discriminator.  A frame that fails
//!    here is not a protocol message at all and is dropped.
//! 2. The type-specific payload ([`UsernameMsg`], [`KeyRequest`],
//!    [`SignalMsg`]) is decoded from the same bytes.  A failure here is a
//!    client mistake and is reported back with a [`ServerMsg::Error`].
//!
//! # Client → server
//!
//! ```json
//! {"type":"username","name":"alice","pk":"<base64, 32 bytes>"}
//! {"type":"ping","data":"anything"}
//! {"type":"getkey","target":2}
//! {"type":"getpeers"}
//! {"type":"offer","target":"<alias>","sdp":"v=0..."}
//! ```
//!
//! # Server → client
//!
//! ```json
//! {"type":"id","id":1}
//! {"type":"pong","data":"anything"}
//! {"type":"key","target":2,"alias":"<alias>","pk":"<base64>"}
//! {"type":"peers","peers":["<alias>","<alias>"]}
//! {"type":"error","kind":"not_found","request":"offer","message":"..."}
//! ```
//!
//! `offer` and `answer` frames are forwarded to their target verbatim, so
//! they have no server → client variant here.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Inbound ───────────────────────────────────────────────────────────────────

/// Minimal view of an inbound frame: just the discriminator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: String,
}

impl Envelope {
    /// Reads the discriminator of a text frame.
    ///
    /// Only a JSON object qualifies.  The derived deserializer alone would
    /// also take a one-element array such as `["ping"]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `frame` is not a JSON object with a string
    /// `"type"` field.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        let fields: Map<String, Value> = serde_json::from_str(frame)?;
        serde_json::from_value(Value::Object(fields))
    }
}

/// The inbound message types the dispatcher knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Username,
    Ping,
    GetKey,
    GetPeers,
    Offer,
    Answer,
    /// Reserved; accepted and ignored.
    Message,
    /// Deprecated; accepted and ignored.
    GetAlias,
    Unknown(String),
}

impl MessageKind {
    /// Maps a `"type"` string to a [`MessageKind`].
    pub fn from_type(msg_type: &str) -> Self {
        match msg_type {
            "username" => MessageKind::Username,
            "ping" => MessageKind::Ping,
            "getkey" => MessageKind::GetKey,
            "getpeers" => MessageKind::GetPeers,
            "offer" => MessageKind::Offer,
            "answer" => MessageKind::Answer,
            "message" => MessageKind::Message,
            "getalias" => MessageKind::GetAlias,
            other => MessageKind::Unknown(other.to_string()),
        }
    }

    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Username => "username",
            MessageKind::Ping => "ping",
            MessageKind::GetKey => "getkey",
            MessageKind::GetPeers => "getpeers",
            MessageKind::Offer => "offer",
            MessageKind::Answer => "answer",
            MessageKind::Message => "message",
            MessageKind::GetAlias => "getalias",
            MessageKind::Unknown(other) => other,
        }
    }
}

/// A client announcing its display name and public key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UsernameMsg {
    pub name: String,
    /// Standard base64; at least 32 bytes once decoded.
    pub pk: String,
}

/// A request for a peer's public key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeyRequest {
    pub target: Target,
}

/// An `offer` or `answer` on its way to another peer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignalMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub target: Target,
    /// Opaque session description; never inspected.
    pub sdp: String,
}

/// How a client names another client.
///
/// A JSON number is a connection id; a JSON string is an alias previously
/// handed out to the requesting client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Id(u64),
    Alias(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Id(id) => write!(f, "id {id}"),
            // Aliases are long; the prefix is enough to correlate log lines.
            Target::Alias(alias) => {
                let prefix: String = alias.chars().take(12).collect();
                write!(f, "alias {prefix}…")
            }
        }
    }
}

/// Builds the `pong` reply for a `ping` frame.
///
/// Every field of the ping is echoed back unchanged; only `"type"` flips to
/// `"pong"`.
///
/// # Errors
///
/// Returns an error if `frame` is not a JSON object.
pub fn pong_reply(frame: &str) -> Result<String, serde_json::Error> {
    let mut fields: Map<String, Value> = serde_json::from_str(frame)?;
    fields.insert("type".to_string(), Value::String("pong".to_string()));
    serde_json::to_string(&fields)
}

// ── Outbound ──────────────────────────────────────────────────────────────────

/// Messages generated by the server itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMsg {
    /// First frame on every connection: the id assigned to it.
    Id { id: u64 },

    /// Reply to `getkey`.
    Key {
        /// The target exactly as the request named it.
        target: Target,
        /// The target's alias under the requester's key.
        alias: String,
        /// The target's claimed public key, base64.
        pk: String,
    },

    /// Reply to `getpeers`: aliases of every other identified client.
    Peers { peers: Vec<String> },

    /// A recoverable protocol error.  The connection stays open.
    Error {
        kind: ErrorKind,
        /// The `"type"` of the request that failed.
        request: String,
        /// Human-readable detail, for logs.
        message: String,
    },
}

impl ServerMsg {
    /// Serializes the message to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Machine-readable category of a [`ServerMsg::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedPayload,
    NotFound,
    NotIdentified,
    AlreadyIdentified,
    /// Another connected client already uses the requested name.
    NameTaken,
    Busy,
    AliasUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_reads_type_and_ignores_other_fields() {
        let env: Envelope = serde_json::from_str(r#"{"type":"offer","target":2}"#).unwrap();
        assert_eq!(env.msg_type, "offer");
    }

    #[test]
    fn test_envelope_rejects_non_string_type() {
        assert!(serde_json::from_str::<Envelope>(r#"{"type":7}"#).is_err());
    }

    #[test]
    fn test_envelope_rejects_invalid_json() {
        assert!(Envelope::from_frame("{not json").is_err());
    }

    #[test]
    fn test_envelope_from_frame_reads_object() {
        let env = Envelope::from_frame(r#"{"type":"getpeers"}"#).unwrap();
        assert_eq!(env.msg_type, "getpeers");
    }

    #[test]
    fn test_envelope_from_frame_rejects_arrays_and_scalars() {
        assert!(Envelope::from_frame(r#"["ping"]"#).is_err());
        assert!(Envelope::from_frame(r#"["getpeers"]"#).is_err());
        assert!(Envelope::from_frame(r#""ping""#).is_err());
        assert!(Envelope::from_frame("42").is_err());
    }

    #[test]
    fn test_envelope_from_frame_requires_type_field() {
        assert!(Envelope::from_frame(r#"{"kind":"ping"}"#).is_err());
        assert!(Envelope::from_frame(r#"{"type":null}"#).is_err());
    }

    #[test]
    fn test_message_kind_maps_known_types() {
        assert_eq!(MessageKind::from_type("username"), MessageKind::Username);
        assert_eq!(MessageKind::from_type("getkey"), MessageKind::GetKey);
        assert_eq!(MessageKind::from_type("getpeers"), MessageKind::GetPeers);
        assert_eq!(MessageKind::from_type("answer"), MessageKind::Answer);
        assert_eq!(MessageKind::from_type("getalias"), MessageKind::GetAlias);
    }

    #[test]
    fn test_message_kind_keeps_unknown_type_name() {
        let kind = MessageKind::from_type("subscribe");
        assert_eq!(kind, MessageKind::Unknown("subscribe".to_string()));
        assert_eq!(kind.as_str(), "subscribe");
    }

    #[test]
    fn test_target_number_is_id() {
        let req: KeyRequest = serde_json::from_str(r#"{"type":"getkey","target":2}"#).unwrap();
        assert_eq!(req.target, Target::Id(2));
    }

    #[test]
    fn test_target_string_is_alias() {
        let req: KeyRequest =
            serde_json::from_str(r#"{"type":"getkey","target":"QUJD"}"#).unwrap();
        assert_eq!(req.target, Target::Alias("QUJD".to_string()));
    }

    #[test]
    fn test_target_missing_or_wrong_shape_is_rejected() {
        assert!(serde_json::from_str::<KeyRequest>(r#"{"type":"getkey"}"#).is_err());
        assert!(serde_json::from_str::<KeyRequest>(r#"{"type":"getkey","target":-1}"#).is_err());
        assert!(
            serde_json::from_str::<KeyRequest>(r#"{"type":"getkey","target":[1]}"#).is_err()
        );
    }

    #[test]
    fn test_signal_msg_requires_sdp() {
        assert!(serde_json::from_str::<SignalMsg>(r#"{"type":"offer","target":2}"#).is_err());
        let msg: SignalMsg =
            serde_json::from_str(r#"{"type":"offer","target":2,"sdp":"X"}"#).unwrap();
        assert_eq!(msg.sdp, "X");
    }

    #[test]
    fn test_pong_reply_echoes_payload_and_flips_type() {
        // Arrange
        let ping = r#"{"type":"ping","data":{"seq":3,"note":"hi"}}"#;

        // Act
        let pong: Value = serde_json::from_str(&pong_reply(ping).unwrap()).unwrap();

        // Assert
        assert_eq!(pong["type"], "pong");
        assert_eq!(pong["data"]["seq"], 3);
        assert_eq!(pong["data"]["note"], "hi");
    }

    #[test]
    fn test_pong_reply_rejects_non_object() {
        assert!(pong_reply("[1,2,3]").is_err());
    }

    #[test]
    fn test_server_id_message_shape() {
        let json = ServerMsg::Id { id: 1 }.to_json().unwrap();
        assert_eq!(json, r#"{"type":"id","id":1}"#);
    }

    #[test]
    fn test_server_error_message_shape() {
        let json = ServerMsg::Error {
            kind: ErrorKind::NotFound,
            request: "offer".to_string(),
            message: "no such peer".to_string(),
        }
        .to_json()
        .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["kind"], "not_found");
        assert_eq!(value["request"], "offer");
    }

    #[test]
    fn test_server_key_message_echoes_numeric_target() {
        let json = ServerMsg::Key {
            target: Target::Id(4),
            alias: "a".to_string(),
            pk: "b".to_string(),
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"key","target":4,"alias":"a","pk":"b"}"#);
    }

    #[test]
    fn test_error_kind_name_taken_wire_name() {
        let json = serde_json::to_string(&ErrorKind::NameTaken).unwrap();
        assert_eq!(json, r#""name_taken""#);
    }

    #[test]
    fn test_target_display_truncates_alias() {
        let target = Target::Alias("abcdefghijklmnopqrstuvwxyz".to_string());
        assert_eq!(target.to_string(), "alias abcdefghijkl…");
        assert_eq!(Target::Id(9).to_string(), "id 9");
    }
}
