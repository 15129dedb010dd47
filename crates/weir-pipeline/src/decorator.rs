//! Peer-forwarding processor decorator
//!
//! Wraps a processor whose plugin declares cluster-wide key affinity.
//! Each batch is partitioned by the hash of the configured
//! identification keys; partitions owned by other nodes are sent over
//! the forwarding RPC, records received from peers are appended to the
//! local partition, and the wrapped processor runs once on the resulting
//! locally-owned set.
//!
//! Partitioning iterates the batch in order, so per-key order is
//! preserved; across keys no order is guaranteed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use weir_model::{identification_hash, Processor, ProcessorError, Record};
use weir_peer::{PeerForwarder, PeerId};

const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Decorator routing each record to the cluster node owning its key.
///
/// The plugin id on the wire is the wrapped plugin's real name, so two
/// decorated processors never see each other's records.
pub struct PeerForwardingProcessor {
    inner: Arc<dyn Processor>,
    forwarder: Arc<dyn PeerForwarder>,
    plugin_id: String,
    identification_keys: Vec<String>,
    max_attempts: usize,
    initial_backoff: Duration,
    records_forwarded: AtomicU64,
    records_received: AtomicU64,
    records_dropped: AtomicU64,
}

impl PeerForwardingProcessor {
    /// Wrap a processor with default retry policy
    pub fn new(
        inner: Arc<dyn Processor>,
        forwarder: Arc<dyn PeerForwarder>,
        plugin_id: impl Into<String>,
        identification_keys: Vec<String>,
    ) -> Self {
        Self {
            inner,
            forwarder,
            plugin_id: plugin_id.into(),
            identification_keys,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            records_forwarded: AtomicU64::new(0),
            records_received: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
        }
    }

    /// Override the retry policy
    #[must_use]
    pub fn with_retry(mut self, max_attempts: usize, initial_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    /// The plugin id used on the wire
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Records sent to peers so far
    pub fn records_forwarded(&self) -> u64 {
        self.records_forwarded.load(Ordering::Relaxed)
    }

    /// Records received from peers so far
    pub fn records_received(&self) -> u64 {
        self.records_received.load(Ordering::Relaxed)
    }

    /// Records dropped after exhausting the retry budget
    pub fn records_dropped(&self) -> u64 {
        self.records_dropped.load(Ordering::Relaxed)
    }

    /// Send one partition with exponential backoff.
    ///
    /// A missing peer fails each attempt immediately, which amounts to
    /// an immediate timeout; the retry budget still applies in case the
    /// peer rejoins between attempts.
    async fn forward_with_backoff(&self, peer: &PeerId, records: &[Record]) -> bool {
        let mut backoff = self.initial_backoff;

        for attempt in 1..=self.max_attempts {
            match self.forwarder.forward(&self.plugin_id, peer, records).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::debug!(
                        plugin = %self.plugin_id,
                        peer = %peer,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "forward attempt failed"
                    );
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
        false
    }
}

#[async_trait]
impl Processor for PeerForwardingProcessor {
    async fn execute(
        &self,
        batch: Vec<Record>,
    ) -> std::result::Result<Vec<Record>, ProcessorError> {
        let local_peer = self.forwarder.local_peer().clone();

        let mut local = Vec::with_capacity(batch.len());
        let mut remote: HashMap<PeerId, Vec<Record>> = HashMap::new();
        let mut unowned: Vec<(u64, Record)> = Vec::new();

        for record in batch {
            let hash = identification_hash(record.event(), &self.identification_keys);
            match self.forwarder.owner_of(hash) {
                Some(owner) if owner == local_peer => local.push(record),
                Some(owner) => remote.entry(owner).or_default().push(record),
                None => unowned.push((hash, record)),
            }
        }

        // An empty owner selection is an immediate timeout and spends
        // the same bounded backoff budget as a send timeout: re-select
        // each attempt, drop only once the budget is exhausted
        if !unowned.is_empty() {
            let mut backoff = self.initial_backoff;
            for _ in 1..self.max_attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;

                let pending = std::mem::take(&mut unowned);
                for (hash, record) in pending {
                    match self.forwarder.owner_of(hash) {
                        Some(owner) if owner == local_peer => local.push(record),
                        Some(owner) => remote.entry(owner).or_default().push(record),
                        None => unowned.push((hash, record)),
                    }
                }
                if unowned.is_empty() {
                    break;
                }
            }

            if !unowned.is_empty() {
                let count = unowned.len() as u64;
                self.records_dropped.fetch_add(count, Ordering::Relaxed);
                tracing::warn!(
                    plugin = %self.plugin_id,
                    records = count,
                    attempts = self.max_attempts,
                    "dropping records: no owning peer after exhausting selection attempts"
                );
            }
        }

        for (peer, records) in remote {
            let count = records.len() as u64;
            if self.forward_with_backoff(&peer, &records).await {
                self.records_forwarded.fetch_add(count, Ordering::Relaxed);
            } else {
                self.records_dropped.fetch_add(count, Ordering::Relaxed);
                tracing::warn!(
                    plugin = %self.plugin_id,
                    peer = %peer,
                    records = count,
                    "dropping records after exhausting forward attempts"
                );
            }
        }

        let received = self.forwarder.drain_received(&self.plugin_id);
        if !received.is_empty() {
            self.records_received
                .fetch_add(received.len() as u64, Ordering::Relaxed);
            local.extend(received);
        }

        self.inner.execute(local).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
#[path = "decorator_test.rs"]
mod tests;
