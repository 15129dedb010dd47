//! TCP peer forwarder
//!
//! Frames record batches as length-prefixed JSON envelopes:
//!
//! ```text
//! [4 bytes: length (big-endian)][N bytes: JSON ForwardEnvelope]
//! ```
//!
//! Every node runs the same listener; received envelopes land in a
//! per-plugin inbox that the forwarding decorator drains. Connections to
//! peers are cached and invalidated on error, and each forward attempt
//! carries a single request timeout covering connect, write, and ack.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use async_trait::async_trait;
use weir_model::Record;

use crate::ring::PeerRing;
use crate::{PeerForwardError, PeerForwarder, PeerId};

const ACK: u8 = 0x01;

/// Maximum accepted frame size (guards the server against bad peers)
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Configuration for the TCP forwarder
#[derive(Debug, Clone)]
pub struct RemotePeerForwarderConfig {
    /// Address this node listens on; also its peer identity
    pub listen: String,

    /// The other cluster members
    pub peers: Vec<PeerId>,

    /// Budget for one forward attempt (connect + write + ack)
    pub request_timeout: Duration,
}

impl RemotePeerForwarderConfig {
    pub fn new(listen: impl Into<String>, peers: Vec<PeerId>) -> Self {
        Self {
            listen: listen.into(),
            peers,
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// What goes on the wire for one forward call
#[derive(Debug, Serialize, Deserialize)]
struct ForwardEnvelope {
    plugin_id: String,
    records: Vec<Record>,
}

/// Records received from peers, segregated by plugin id
#[derive(Debug, Default)]
pub struct PeerInbox {
    slots: Mutex<HashMap<String, Vec<Record>>>,
}

impl PeerInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received records for a plugin
    pub fn push(&self, plugin_id: &str, records: Vec<Record>) {
        self.slots
            .lock()
            .entry(plugin_id.to_string())
            .or_default()
            .extend(records);
    }

    /// Take everything received for a plugin
    pub fn drain(&self, plugin_id: &str) -> Vec<Record> {
        self.slots
            .lock()
            .get_mut(plugin_id)
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

/// TCP implementation of [`PeerForwarder`]
pub struct RemotePeerForwarder {
    local: PeerId,
    ring: PeerRing,
    inbox: Arc<PeerInbox>,
    connections: tokio::sync::Mutex<HashMap<PeerId, TcpStream>>,
    request_timeout: Duration,
}

impl RemotePeerForwarder {
    /// Bind the listener, start the receive loop, and return the
    /// forwarder. The local node is part of the ring alongside the
    /// configured peers.
    pub async fn bind(
        config: RemotePeerForwarderConfig,
        shutdown: CancellationToken,
    ) -> std::io::Result<Arc<Self>> {
        let listener = TcpListener::bind(&config.listen).await?;
        // Resolve the actual bound address so `listen = "host:0"` works
        let local = PeerId::new(listener.local_addr()?.to_string());

        let mut members = config.peers.clone();
        members.push(local.clone());
        let ring = PeerRing::new(members);

        let inbox = Arc::new(PeerInbox::new());
        tokio::spawn(Self::serve(listener, Arc::clone(&inbox), shutdown));

        tracing::info!(
            local = %local,
            peers = ring.len(),
            "peer forwarder listening"
        );

        Ok(Arc::new(Self {
            local,
            ring,
            inbox,
            connections: tokio::sync::Mutex::new(HashMap::new()),
            request_timeout: config.request_timeout,
        }))
    }

    /// The live peer set
    pub fn ring(&self) -> &PeerRing {
        &self.ring
    }

    async fn serve(listener: TcpListener, inbox: Arc<PeerInbox>, shutdown: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, remote)) => {
                    let inbox = Arc::clone(&inbox);
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_peer(stream, &inbox, shutdown).await {
                            tracing::debug!(peer = %remote, error = %e, "peer connection closed");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "peer listener accept failed");
                }
            }
        }
        tracing::debug!("peer forwarder listener stopped");
    }

    async fn handle_peer(
        mut stream: TcpStream,
        inbox: &PeerInbox,
        shutdown: CancellationToken,
    ) -> std::io::Result<()> {
        loop {
            let mut len_bytes = [0u8; 4];
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                read = stream.read_exact(&mut len_bytes) => {
                    match read {
                        Ok(_) => {}
                        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                        Err(e) => return Err(e),
                    }
                }
            }

            let len = u32::from_be_bytes(len_bytes);
            if len > MAX_FRAME_BYTES {
                return Err(std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!("frame of {} bytes exceeds limit", len),
                ));
            }

            let mut payload = vec![0u8; len as usize];
            stream.read_exact(&mut payload).await?;

            let envelope: ForwardEnvelope = serde_json::from_slice(&payload)
                .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;

            tracing::trace!(
                plugin = %envelope.plugin_id,
                records = envelope.records.len(),
                "received forwarded records"
            );
            inbox.push(&envelope.plugin_id, envelope.records);

            stream.write_all(&[ACK]).await?;
        }
    }

    async fn send_frame(&self, peer: &PeerId, frame: &[u8]) -> Result<(), PeerForwardError> {
        let mut connections = self.connections.lock().await;

        if !connections.contains_key(peer) {
            let stream = TcpStream::connect(peer.endpoint())
                .await
                .map_err(|e| PeerForwardError::transport(peer, e))?;
            connections.insert(peer.clone(), stream);
        }
        let stream = connections.get_mut(peer).expect("inserted above");

        let result: std::io::Result<()> = async {
            stream.write_all(&(frame.len() as u32).to_be_bytes()).await?;
            stream.write_all(frame).await?;
            stream.flush().await?;

            let mut ack = [0u8; 1];
            stream.read_exact(&mut ack).await?;
            if ack[0] != ACK {
                return Err(std::io::Error::new(ErrorKind::InvalidData, "bad ack"));
            }
            Ok(())
        }
        .await;

        if let Err(e) = result {
            // Stale or broken connection; next attempt reconnects
            connections.remove(peer);
            return Err(PeerForwardError::transport(peer, e));
        }
        Ok(())
    }
}

#[async_trait]
impl PeerForwarder for RemotePeerForwarder {
    fn local_peer(&self) -> &PeerId {
        &self.local
    }

    fn owner_of(&self, key_hash: u64) -> Option<PeerId> {
        self.ring.owner_of(key_hash)
    }

    async fn forward(
        &self,
        plugin_id: &str,
        peer: &PeerId,
        records: &[Record],
    ) -> Result<(), PeerForwardError> {
        if !self.ring.contains(peer) {
            return Err(PeerForwardError::unavailable(peer));
        }

        let envelope = ForwardEnvelope {
            plugin_id: plugin_id.to_string(),
            records: records.to_vec(),
        };
        let frame = serde_json::to_vec(&envelope)?;

        match timeout(self.request_timeout, self.send_frame(peer, &frame)).await {
            Ok(result) => result,
            Err(_) => {
                // Drop any half-written connection before giving up
                self.connections.lock().await.remove(peer);
                Err(PeerForwardError::timeout(peer))
            }
        }
    }

    fn drain_received(&self, plugin_id: &str) -> Vec<Record> {
        self.inbox.drain(plugin_id)
    }
}

#[cfg(test)]
#[path = "remote_test.rs"]
mod tests;
