//! Client registry: the live set of connections.
//!
//! One [`Registry`] exists per server and is shared as `Arc<Registry>` by
//! every session task.  Membership equals liveness: a connection is
//! registered right after its WebSocket handshake and removed by id when its
//! session ends.
//!
//! # Synchronization
//!
//! - Ids come from an `AtomicU64`, so allocation never takes a lock.
//! - The client map sits behind one `tokio::sync::RwLock`.  Every operation
//!   takes the lock for its own duration only; callers get cloned
//!   [`PeerRecord`]s and never hold the lock while writing to a socket.
//!
//! # Map choice
//!
//! A `BTreeMap<ClientId, PeerRecord>` keeps peers in ascending id order,
//! which is the order `getpeers` reports them in.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use minedive_core::AliasCodec;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::application::error::SignalError;
use crate::application::handle::ConnectionHandle;
use crate::domain::{ClientId, PublicKey};

/// What other connections may know about a client.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub id: ClientId,
    /// Empty until the client identifies.
    pub name: String,
    pub public_key: Option<PublicKey>,
    pub remote_addr: SocketAddr,
    pub handle: ConnectionHandle,
}

impl PeerRecord {
    /// A freshly accepted, not yet identified connection.
    pub fn new(id: ClientId, remote_addr: SocketAddr, handle: ConnectionHandle) -> Self {
        Self {
            id,
            name: String::new(),
            public_key: None,
            remote_addr,
            handle,
        }
    }

    /// Whether the client has sent `username`.
    pub fn is_identified(&self) -> bool {
        self.public_key.is_some()
    }
}

/// The process-wide table of connected clients.
pub struct Registry {
    next_id: AtomicU64,
    clients: RwLock<BTreeMap<ClientId, PeerRecord>>,
}

impl Registry {
    /// Creates an empty registry whose first id is 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            clients: RwLock::new(BTreeMap::new()),
        }
    }

    /// Allocates the next connection id.
    ///
    /// Ids are unique for the life of the process.  The counter wraps at
    /// `u64::MAX`, which no real process reaches.
    pub fn next_id(&self) -> ClientId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Adds a connection to the live set.
    pub async fn register(&self, record: PeerRecord) {
        let id = record.id;
        let mut clients = self.clients.write().await;
        if clients.insert(id, record).is_some() {
            // Ids come from next_id(), so this means a caller reused one.
            warn!(client = id, "registry entry replaced for reused id");
        }
        debug!(client = id, live = clients.len(), "client registered");
    }

    /// Removes the connection with `id`.
    ///
    /// Returns `false` if it was already gone; removing twice is harmless.
    pub async fn unregister(&self, id: ClientId) -> bool {
        let removed = self.clients.write().await.remove(&id).is_some();
        if removed {
            debug!(client = id, "client unregistered");
        }
        removed
    }

    /// Removes the connection whose name equals `name`.
    ///
    /// Returns the removed id, or `None` if nobody has that name.  Session
    /// teardown uses [`unregister`](Self::unregister) instead, since a client
    /// that never identified has no name.
    pub async fn unregister_by_name(&self, name: &str) -> Option<ClientId> {
        let mut clients = self.clients.write().await;
        let id = clients
            .values()
            .find(|record| record.name == name)
            .map(|record| record.id)?;
        clients.remove(&id);
        Some(id)
    }

    /// Stores the name and public key from a `username` message.
    ///
    /// Names are unique among identified clients.  The check and the update
    /// happen under one write lock, so two clients racing for the same name
    /// cannot both win.
    ///
    /// # Errors
    ///
    /// - [`SignalError::NameTaken`] if another identified client has `name`.
    /// - [`SignalError::NotFound`] if `id` is not registered.
    pub async fn set_identity(
        &self,
        id: ClientId,
        name: String,
        public_key: PublicKey,
    ) -> Result<(), SignalError> {
        let mut clients = self.clients.write().await;
        if clients
            .values()
            .any(|record| record.id != id && record.is_identified() && record.name == name)
        {
            return Err(SignalError::NameTaken(name));
        }
        let record = clients
            .get_mut(&id)
            .ok_or_else(|| SignalError::NotFound(format!("id {id}")))?;
        record.name = name;
        record.public_key = Some(public_key);
        Ok(())
    }

    /// Looks a connection up by id.
    ///
    /// # Errors
    ///
    /// [`SignalError::NotFound`] if `id` is not registered.
    pub async fn find_by_id(&self, id: ClientId) -> Result<PeerRecord, SignalError> {
        self.clients
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| SignalError::NotFound(format!("id {id}")))
    }

    /// Looks up the identified connection named `name`.
    ///
    /// # Errors
    ///
    /// [`SignalError::NotFound`] unless exactly one identified client has
    /// that name.
    pub async fn find_by_name(&self, name: &str) -> Result<PeerRecord, SignalError> {
        let clients = self.clients.read().await;
        let mut matches = clients
            .values()
            .filter(|record| record.is_identified() && record.name == name);
        match (matches.next(), matches.next()) {
            (Some(record), None) => Ok(record.clone()),
            (Some(_), Some(_)) => {
                warn!("name {name:?} is held by more than one client");
                Err(SignalError::NotFound("name (ambiguous)".to_string()))
            }
            (None, _) => Err(SignalError::NotFound("name".to_string())),
        }
    }

    /// Resolves an alias issued by `codec` to the connection it names.
    ///
    /// # Errors
    ///
    /// [`SignalError::NotFound`] if the alias does not open under `codec` or
    /// names a client that is no longer connected.
    pub async fn find_by_alias(
        &self,
        alias: &str,
        codec: &AliasCodec,
    ) -> Result<PeerRecord, SignalError> {
        let name = codec.decode(alias)?;
        self.find_by_name(&name).await
    }

    /// Identified connections other than `id`, in ascending id order.
    pub async fn peers_except(&self, id: ClientId) -> Vec<PeerRecord> {
        self.clients
            .read()
            .await
            .values()
            .filter(|record| record.id != id && record.is_identified())
            .cloned()
            .collect()
    }

    /// Id, name and address of every live connection, for diagnostics.
    pub async fn snapshot(&self) -> Vec<(ClientId, String, SocketAddr)> {
        self.clients
            .read()
            .await
            .values()
            .map(|record| (record.id, record.name.clone(), record.remote_addr))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
