//! Weir - Peer
//!
//! Cluster peer membership and the record-forwarding RPC.
//!
//! # Overview
//!
//! Stateful processors need all records of a key group on one node. The
//! pieces here provide that affinity:
//!
//! - [`PeerRing`] - the live peer set with deterministic key-hash →
//!   owner selection (every node resolves the same owner for the same
//!   hash, given the same membership)
//! - [`PeerForwarder`] - the contract the pipeline decorator consumes:
//!   who owns a hash, send records to a peer, drain records received
//!   from peers
//! - [`LocalPeerForwarder`] - the single-node implementation; everything
//!   is owned locally and nothing is ever sent
//! - [`RemotePeerForwarder`] - TCP implementation framing batches as
//!   length-prefixed JSON envelopes keyed by plugin id
//!
//! One forwarding attempt has a single timeout; retry policy (bounded
//! attempts with exponential backoff) belongs to the caller.

mod error;
mod local;
mod remote;
mod ring;

pub use error::PeerForwardError;
pub use local::LocalPeerForwarder;
pub use remote::{PeerInbox, RemotePeerForwarder, RemotePeerForwarderConfig};
pub use ring::PeerRing;

use async_trait::async_trait;

use weir_model::Record;

/// A cluster peer, identified by its forwarding endpoint (`host:port`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer id from an endpoint string
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self(endpoint.into())
    }

    /// The peer's endpoint
    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(endpoint: &str) -> Self {
        Self::new(endpoint)
    }
}

/// The forwarding contract consumed by the pipeline's peer-forwarding
/// decorator.
///
/// Implementations are shared across all decorated processors in the
/// process; received records are segregated by plugin id so decorators
/// only see their own traffic.
#[async_trait]
pub trait PeerForwarder: Send + Sync {
    /// This node's own peer id
    fn local_peer(&self) -> &PeerId;

    /// The peer owning a key hash, over the live peer set.
    ///
    /// Returns `None` only when the peer set is empty.
    fn owner_of(&self, key_hash: u64) -> Option<PeerId>;

    /// Send records to a peer for the given plugin id.
    ///
    /// One attempt with one timeout; a peer missing from the live set
    /// fails immediately with [`PeerForwardError::PeerUnavailable`].
    async fn forward(
        &self,
        plugin_id: &str,
        peer: &PeerId,
        records: &[Record],
    ) -> Result<(), PeerForwardError>;

    /// Take all records received from peers for the given plugin id
    fn drain_received(&self, plugin_id: &str) -> Vec<Record>;
}
