//! Peer forwarding errors

use thiserror::Error;

/// A failed forwarding attempt.
///
/// The decorator retries these with backoff; after the attempt budget is
/// exhausted the affected records are dropped and counted.
#[derive(Debug, Error)]
pub enum PeerForwardError {
    /// The send did not complete within the attempt timeout
    #[error("forward to peer '{peer}' timed out")]
    Timeout { peer: String },

    /// The selected peer is not in the live peer set
    #[error("peer '{peer}' is not available")]
    PeerUnavailable { peer: String },

    /// Transport failure (connect, write, or ack)
    #[error("forward to peer '{peer}' failed: {message}")]
    Transport { peer: String, message: String },

    /// Records could not be serialized for the wire
    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PeerForwardError {
    /// Create a Timeout error
    pub fn timeout(peer: impl std::fmt::Display) -> Self {
        Self::Timeout {
            peer: peer.to_string(),
        }
    }

    /// Create a PeerUnavailable error
    pub fn unavailable(peer: impl std::fmt::Display) -> Self {
        Self::PeerUnavailable {
            peer: peer.to_string(),
        }
    }

    /// Create a Transport error
    pub fn transport(peer: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            peer: peer.to_string(),
            message: message.to_string(),
        }
    }
}
