//! Single-node forwarder
//!
//! The degenerate cluster: this node owns every key, so nothing is ever
//! forwarded and nothing is ever received.

use async_trait::async_trait;

use weir_model::Record;

use crate::{PeerForwardError, PeerForwarder, PeerId};

/// Forwarder for a single-node deployment
#[derive(Debug)]
pub struct LocalPeerForwarder {
    local: PeerId,
}

impl LocalPeerForwarder {
    /// Create a local forwarder with the given node identity
    pub fn new(local: PeerId) -> Self {
        Self { local }
    }
}

impl Default for LocalPeerForwarder {
    fn default() -> Self {
        Self::new(PeerId::new("local"))
    }
}

#[async_trait]
impl PeerForwarder for LocalPeerForwarder {
    fn local_peer(&self) -> &PeerId {
        &self.local
    }

    fn owner_of(&self, _key_hash: u64) -> Option<PeerId> {
        Some(self.local.clone())
    }

    async fn forward(
        &self,
        _plugin_id: &str,
        peer: &PeerId,
        _records: &[Record],
    ) -> Result<(), PeerForwardError> {
        // Single node: every owner is local, so a forward request can
        // only name a peer that does not exist
        Err(PeerForwardError::unavailable(peer))
    }

    fn drain_received(&self, _plugin_id: &str) -> Vec<Record> {
        Vec::new()
    }
}
