//! Signaling router: key lookups, peer lists and offer/answer forwarding.
//!
//! The router only ever writes to other connections through their
//! [`ConnectionHandle`](crate::application::ConnectionHandle) queue, with
//! `try_send`, so a slow or vanished peer can't stall the requester.

use std::sync::Arc;

use minedive_core::protocol::messages::{KeyRequest, SignalMsg};
use minedive_core::{ServerMsg, Target};
use tracing::debug;

use crate::application::client::Client;
use crate::application::error::SignalError;
use crate::application::registry::{PeerRecord, Registry};

/// Implements `getkey`, `getpeers`, `offer` and `answer`.
pub struct SignalingRouter {
    registry: Arc<Registry>,
}

impl SignalingRouter {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Resolves a target named by `client`: ids directly, aliases through the
    /// client's own codec.
    async fn resolve(&self, client: &Client, target: &Target) -> Result<PeerRecord, SignalError> {
        let found = match target {
            Target::Id(id) => self.registry.find_by_id(*id).await,
            Target::Alias(alias) => self.registry.find_by_alias(alias, client.codec()).await,
        };
        found.map_err(|_| SignalError::NotFound(target.to_string()))
    }

    /// Answers a `getkey` request with the target's public key and an alias
    /// for it.
    ///
    /// # Errors
    ///
    /// - [`SignalError::NotFound`] if the target is not connected or has not
    ///   published a key yet.
    /// - [`SignalError::NonceExhausted`] if the requester can't get new aliases.
    pub async fn send_key(
        &self,
        client: &mut Client,
        request: &KeyRequest,
    ) -> Result<(), SignalError> {
        let target = self.resolve(client, &request.target).await?;
        let pk = target
            .public_key
            .ok_or_else(|| SignalError::NotFound(request.target.to_string()))?;
        let alias = client.alias_for(&target.name)?;

        debug!(client = client.id(), target = target.id, "sending key");
        client
            .send_msg(&ServerMsg::Key {
                target: request.target.clone(),
                alias,
                pk: pk.to_base64(),
            })
            .await
    }

    /// Answers `getpeers` with an alias for every other identified client.
    ///
    /// Aliases are made under the requester's key, so they are useless to
    /// anyone else and never reveal a name.
    pub async fn send_peers(&self, client: &mut Client) -> Result<(), SignalError> {
        let peers = self.registry.peers_except(client.id()).await;
        let aliases = peers
            .iter()
            .map(|peer| client.alias_for(&peer.name))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(client = client.id(), count = aliases.len(), "sending peers");
        client.send_msg(&ServerMsg::Peers { peers: aliases }).await
    }

    /// Forwards an `offer`/`answer` frame, byte for byte, to its target.
    ///
    /// # Errors
    ///
    /// - [`SignalError::NotFound`] if the target is not connected (or
    ///   disconnects while the frame is in flight).
    /// - [`SignalError::QueueFull`] if the target is not draining its queue.
    pub async fn forward_to_target(
        &self,
        client: &Client,
        msg: &SignalMsg,
        raw: &str,
    ) -> Result<(), SignalError> {
        let target = self.resolve(client, &msg.target).await?;
        target
            .handle
            .try_send_text(raw.to_string())
            .map_err(|e| match e {
                SignalError::TransportClosed => SignalError::NotFound(msg.target.to_string()),
                other => other,
            })?;

        debug!(
            client = client.id(),
            target = target.id,
            "forwarded {}",
            msg.msg_type
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handle::ConnectionHandle;
    use crate::domain::PublicKey;
    use minedive_core::{AliasCodec, NonceCounter, NONCE_LEN};
    use tokio::sync::mpsc::Receiver;

    struct Peer {
        client: Client,
        rx: Receiver<String>,
    }

    async fn connect(registry: &Arc<Registry>, name: Option<&str>) -> Peer {
        let id = registry.next_id();
        let addr = "10.0.0.1:1234".parse().unwrap();
        let (handle, rx) = ConnectionHandle::channel(id, 8);
        let mut client = Client::new(id, addr, handle.clone());
        registry.register(PeerRecord::new(id, addr, handle)).await;
        if let Some(name) = name {
            let pk = PublicKey::new([id as u8; 32]);
            client.identify(name.to_string(), pk).unwrap();
            registry.set_identity(id, name.to_string(), pk).await.unwrap();
        }
        Peer { client, rx }
    }

    fn reply(rx: &mut Receiver<String>) -> ServerMsg {
        serde_json::from_str(&rx.try_recv().expect("a reply was queued")).unwrap()
    }

    #[tokio::test]
    async fn test_send_key_by_id_returns_key_and_alias() {
        // Arrange
        let registry = Arc::new(Registry::new());
        let router = SignalingRouter::new(Arc::clone(&registry));
        let mut alice = connect(&registry, Some("alice")).await;
        let bob = connect(&registry, Some("bob")).await;

        // Act
        let request = KeyRequest {
            target: Target::Id(bob.client.id()),
        };
        router.send_key(&mut alice.client, &request).await.unwrap();

        // Assert
        match reply(&mut alice.rx) {
            ServerMsg::Key { target, alias, pk } => {
                assert_eq!(target, Target::Id(bob.client.id()));
                assert_eq!(pk, PublicKey::new([2u8; 32]).to_base64());
                assert_eq!(alice.client.codec().decode(&alias).unwrap(), "bob");
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_key_by_alias_resolves_target() {
        let registry = Arc::new(Registry::new());
        let router = SignalingRouter::new(Arc::clone(&registry));
        let mut alice = connect(&registry, Some("alice")).await;
        let _bob = connect(&registry, Some("bob")).await;
        let alias = alice.client.alias_for("bob").unwrap();

        let request = KeyRequest {
            target: Target::Alias(alias.clone()),
        };
        router.send_key(&mut alice.client, &request).await.unwrap();

        assert!(matches!(
            reply(&mut alice.rx),
            ServerMsg::Key { target: Target::Alias(a), .. } if a == alias
        ));
    }

    #[tokio::test]
    async fn test_send_key_for_missing_target_is_not_found() {
        let registry = Arc::new(Registry::new());
        let router = SignalingRouter::new(Arc::clone(&registry));
        let mut alice = connect(&registry, Some("alice")).await;

        let request = KeyRequest {
            target: Target::Id(99),
        };
        let result = router.send_key(&mut alice.client, &request).await;

        assert!(matches!(result, Err(SignalError::NotFound(_))));
        assert!(alice.rx.try_recv().is_err(), "router must not reply itself");
    }

    #[tokio::test]
    async fn test_send_key_for_unidentified_target_is_not_found() {
        let registry = Arc::new(Registry::new());
        let router = SignalingRouter::new(Arc::clone(&registry));
        let mut alice = connect(&registry, Some("alice")).await;
        let anon = connect(&registry, None).await;

        let request = KeyRequest {
            target: Target::Id(anon.client.id()),
        };
        assert!(matches!(
            router.send_key(&mut alice.client, &request).await,
            Err(SignalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_send_peers_lists_others_as_aliases() {
        // Arrange
        let registry = Arc::new(Registry::new());
        let router = SignalingRouter::new(Arc::clone(&registry));
        let mut alice = connect(&registry, Some("alice")).await;
        let _bob = connect(&registry, Some("bob")).await;
        let _anon = connect(&registry, None).await;
        let _carol = connect(&registry, Some("carol")).await;

        // Act
        router.send_peers(&mut alice.client).await.unwrap();

        // Assert
        let ServerMsg::Peers { peers } = reply(&mut alice.rx) else {
            panic!("expected a peers reply");
        };
        let names: Vec<String> = peers
            .iter()
            .map(|a| alice.client.codec().decode(a).unwrap())
            .collect();
        assert_eq!(names, vec!["bob", "carol"]);
        for alias in &peers {
            assert!(!alias.contains("bob") && !alias.contains("carol"));
        }
    }

    #[tokio::test]
    async fn test_send_peers_alone_is_empty_list() {
        let registry = Arc::new(Registry::new());
        let router = SignalingRouter::new(Arc::clone(&registry));
        let mut alice = connect(&registry, Some("alice")).await;

        router.send_peers(&mut alice.client).await.unwrap();

        assert_eq!(reply(&mut alice.rx), ServerMsg::Peers { peers: vec![] });
    }

    #[tokio::test]
    async fn test_send_peers_with_exhausted_nonce_fails() {
        // Arrange – alice's one-byte counter is already at 0xFF
        let registry = Arc::new(Registry::new());
        let router = SignalingRouter::new(Arc::clone(&registry));
        let id = registry.next_id();
        let addr = "10.0.0.1:1".parse().unwrap();
        let (handle, _rx) = ConnectionHandle::channel(id, 8);
        let mut initial = [0u8; NONCE_LEN];
        initial[NONCE_LEN - 1] = 0xFF;
        let codec = AliasCodec::from_parts([1u8; 32], NonceCounter::new(initial, 1));
        let mut alice = Client::with_codec(id, addr, handle.clone(), codec);
        registry.register(PeerRecord::new(id, addr, handle)).await;
        let _bob = connect(&registry, Some("bob")).await;

        // Act
        let result = router.send_peers(&mut alice).await;

        // Assert
        assert_eq!(result, Err(SignalError::NonceExhausted));
    }

    #[tokio::test]
    async fn test_forward_delivers_raw_frame_to_target_only() {
        // Arrange
        let registry = Arc::new(Registry::new());
        let router = SignalingRouter::new(Arc::clone(&registry));
        let mut alice = connect(&registry, Some("alice")).await;
        let mut bob = connect(&registry, Some("bob")).await;
        let mut carol = connect(&registry, Some("carol")).await;
        let raw = r#"{"type":"offer","target":2,"sdp":"X"}"#;
        let msg: SignalMsg = serde_json::from_str(raw).unwrap();

        // Act
        router
            .forward_to_target(&alice.client, &msg, raw)
            .await
            .unwrap();

        // Assert
        assert_eq!(bob.rx.try_recv().unwrap(), raw);
        assert!(alice.rx.try_recv().is_err());
        assert!(carol.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forward_to_missing_target_is_not_found() {
        let registry = Arc::new(Registry::new());
        let router = SignalingRouter::new(Arc::clone(&registry));
        let alice = connect(&registry, Some("alice")).await;
        let raw = r#"{"type":"answer","target":7,"sdp":"Y"}"#;
        let msg: SignalMsg = serde_json::from_str(raw).unwrap();

        let result = router.forward_to_target(&alice.client, &msg, raw).await;

        assert!(matches!(result, Err(SignalError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_forward_to_target_whose_writer_is_gone_is_not_found() {
        let registry = Arc::new(Registry::new());
        let router = SignalingRouter::new(Arc::clone(&registry));
        let alice = connect(&registry, Some("alice")).await;
        let bob = connect(&registry, Some("bob")).await;
        let bob_id = bob.client.id();
        drop(bob); // receiver gone, registry entry not yet removed

        let raw = format!(r#"{{"type":"offer","target":{bob_id},"sdp":"Z"}}"#);
        let msg: SignalMsg = serde_json::from_str(&raw).unwrap();

        assert!(matches!(
            router.forward_to_target(&alice.client, &msg, &raw).await,
            Err(SignalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_forward_by_alias_reaches_target() {
        let registry = Arc::new(Registry::new());
        let router = SignalingRouter::new(Arc::clone(&registry));
        let mut alice = connect(&registry, Some("alice")).await;
        let mut bob = connect(&registry, Some("bob")).await;
        let alias = alice.client.alias_for("bob").unwrap();
        let raw = serde_json::json!({"type": "offer", "target": alias, "sdp": "S"}).to_string();
        let msg: SignalMsg = serde_json::from_str(&raw).unwrap();

        router
            .forward_to_target(&alice.client, &msg, &raw)
            .await
            .unwrap();

        assert_eq!(bob.rx.try_recv().unwrap(), raw);
    }
}
