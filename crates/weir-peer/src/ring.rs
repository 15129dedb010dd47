//! Peer ring - deterministic key-hash to owner selection
//!
//! Owner selection must agree across every node in the cluster: the
//! peer list is kept sorted, and a hash resolves to `peers[hash % len]`.
//! Any two nodes with the same membership therefore pick the same owner
//! for the same hash, regardless of join order.

use parking_lot::RwLock;

use crate::PeerId;

/// The live peer set with deterministic owner selection
#[derive(Debug)]
pub struct PeerRing {
    peers: RwLock<Vec<PeerId>>,
}

impl PeerRing {
    /// Create a ring from an initial peer set (sorted and deduplicated)
    pub fn new(peers: impl IntoIterator<Item = PeerId>) -> Self {
        let mut peers: Vec<PeerId> = peers.into_iter().collect();
        peers.sort();
        peers.dedup();
        Self {
            peers: RwLock::new(peers),
        }
    }

    /// The peer owning a key hash, or `None` when the ring is empty
    pub fn owner_of(&self, key_hash: u64) -> Option<PeerId> {
        let peers = self.peers.read();
        if peers.is_empty() {
            return None;
        }
        let index = (key_hash % peers.len() as u64) as usize;
        Some(peers[index].clone())
    }

    /// Whether a peer is in the live set
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.read().binary_search(peer).is_ok()
    }

    /// Add a peer, keeping the ring sorted; no-op if already present
    pub fn add(&self, peer: PeerId) {
        let mut peers = self.peers.write();
        if let Err(index) = peers.binary_search(&peer) {
            peers.insert(index, peer);
        }
    }

    /// Remove a peer from the live set
    pub fn remove(&self, peer: &PeerId) {
        let mut peers = self.peers.write();
        if let Ok(index) = peers.binary_search(peer) {
            peers.remove(index);
        }
    }

    /// Number of live peers
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether the ring is empty
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Snapshot of the live peer set
    pub fn peers(&self) -> Vec<PeerId> {
        self.peers.read().clone()
    }
}
