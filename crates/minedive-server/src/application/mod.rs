//! Application layer for minedive-server.
//!
//! Everything that decides *what* happens to a frame lives here; nothing here
//! opens a socket.  Each connection is represented by a [`ConnectionHandle`],
//! a queue whose receiving end is drained onto the WebSocket by the
//! infrastructure layer.  Tests drain it directly instead.
//!
//! # Responsibilities
//!
//! - [`Registry`]: the live set of connections, keyed by id
//! - [`Dispatcher`]: two-step JSON decoding and routing of one frame
//! - [`SignalingRouter`]: `getkey`, `getpeers`, `offer`/`answer` handling
//! - [`Client`]: per-connection state owned by the session task

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod registry;
pub mod router;

pub use client::Client;
pub use dispatcher::Dispatcher;
pub use error::SignalError;
pub use handle::ConnectionHandle;
pub use registry::{PeerRecord, Registry};
pub use router::SignalingRouter;
