//! Decorator tests
//!
//! A scripted forwarder stands in for the cluster: ownership is decided
//! by hash parity, sends are recorded (or made to fail), and a shared
//! inbox plays the role of records arriving from peers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use weir_model::{Event, Processor, ProcessorError, Record};
use weir_peer::{PeerForwardError, PeerForwarder, PeerId};

use super::PeerForwardingProcessor;

fn record(key: i64) -> Record {
    let mut event = Event::new();
    event.insert("k", json!(key));
    Record::new(event, "event")
}

fn keys_of(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|r| r.event().get("k").unwrap().as_i64().unwrap())
        .collect()
}

/// Processor that remembers every batch it was given
#[derive(Default)]
struct RecordingProcessor {
    batches: Mutex<Vec<Vec<Record>>>,
}

impl RecordingProcessor {
    fn observed(&self) -> Vec<Vec<Record>> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl Processor for RecordingProcessor {
    async fn execute(&self, batch: Vec<Record>) -> Result<Vec<Record>, ProcessorError> {
        self.batches.lock().push(batch.clone());
        Ok(batch)
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Scripted two-node forwarder: even hashes belong to the local node,
/// odd hashes to the remote one.
struct ScriptedForwarder {
    local: PeerId,
    remote: PeerId,
    sent: Mutex<Vec<(PeerId, Vec<Record>)>>,
    inbox: Mutex<Vec<Record>>,
    fail_sends: bool,
    send_attempts: AtomicU64,
}

impl ScriptedForwarder {
    fn new(fail_sends: bool) -> Self {
        Self {
            local: PeerId::new("node-x:4910"),
            remote: PeerId::new("node-y:4910"),
            sent: Mutex::new(Vec::new()),
            inbox: Mutex::new(Vec::new()),
            fail_sends,
            send_attempts: AtomicU64::new(0),
        }
    }

    fn stage_received(&self, records: Vec<Record>) {
        self.inbox.lock().extend(records);
    }

    fn sent_batches(&self) -> Vec<(PeerId, Vec<Record>)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl PeerForwarder for ScriptedForwarder {
    fn local_peer(&self) -> &PeerId {
        &self.local
    }

    fn owner_of(&self, key_hash: u64) -> Option<PeerId> {
        if key_hash % 2 == 0 {
            Some(self.local.clone())
        } else {
            Some(self.remote.clone())
        }
    }

    async fn forward(
        &self,
        _plugin_id: &str,
        peer: &PeerId,
        records: &[Record],
    ) -> Result<(), PeerForwardError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends {
            return Err(PeerForwardError::timeout(peer));
        }
        self.sent.lock().push((peer.clone(), records.to_vec()));
        Ok(())
    }

    fn drain_received(&self, _plugin_id: &str) -> Vec<Record> {
        std::mem::take(&mut self.inbox.lock())
    }
}

fn decorator(
    forwarder: &Arc<ScriptedForwarder>,
) -> (Arc<RecordingProcessor>, PeerForwardingProcessor) {
    let inner = Arc::new(RecordingProcessor::default());
    let decorated = PeerForwardingProcessor::new(
        Arc::clone(&inner) as Arc<dyn Processor>,
        Arc::clone(forwarder) as Arc<dyn PeerForwarder>,
        "aggregate_count",
        vec!["k".to_string()],
    )
    .with_retry(3, Duration::from_millis(1));
    (inner, decorated)
}

/// The partition each key lands in under the scripted parity rule
fn is_local(forwarder: &ScriptedForwarder, key: i64) -> bool {
    let hash = weir_model::identification_hash(record(key).event(), &["k".to_string()]);
    forwarder.owner_of(hash).unwrap() == *forwarder.local_peer()
}

#[tokio::test]
async fn test_local_records_keep_order_remote_records_ship() {
    let forwarder = Arc::new(ScriptedForwarder::new(false));
    let (inner, decorated) = decorator(&forwarder);

    // Pick two keys that land on different nodes
    let local_key = (0..100).find(|k| is_local(&forwarder, *k)).unwrap();
    let remote_key = (0..100).find(|k| !is_local(&forwarder, *k)).unwrap();

    let batch = vec![
        record(local_key),
        record(remote_key),
        record(local_key),
        record(local_key),
    ];
    decorated.execute(batch).await.unwrap();

    // The wrapped processor saw only the local partition, in input order
    let observed = inner.observed();
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0].len(), 3);
    assert_eq!(keys_of(&observed[0]), vec![local_key, local_key, local_key]);

    // The remote partition went to the owning peer
    let sent = forwarder.sent_batches();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, PeerId::new("node-y:4910"));
    assert_eq!(keys_of(&sent[0].1), vec![remote_key]);

    assert_eq!(decorated.records_forwarded(), 1);
    assert_eq!(decorated.records_dropped(), 0);
}

#[tokio::test]
async fn test_per_key_order_preserved_in_forwarded_partition() {
    let forwarder = Arc::new(ScriptedForwarder::new(false));
    let (_, decorated) = decorator(&forwarder);

    let remote_key = (0..100).find(|k| !is_local(&forwarder, *k)).unwrap();

    // Tag each record so identical keys stay distinguishable
    let mut batch = Vec::new();
    for seq in 0..5 {
        let mut r = record(remote_key);
        r.event_mut().insert("seq", json!(seq));
        batch.push(r);
    }
    decorated.execute(batch).await.unwrap();

    let sent = forwarder.sent_batches();
    let seqs: Vec<i64> = sent[0]
        .1
        .iter()
        .map(|r| r.event().get("seq").unwrap().as_i64().unwrap())
        .collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_received_records_are_appended_to_local_partition() {
    let forwarder = Arc::new(ScriptedForwarder::new(false));
    let (inner, decorated) = decorator(&forwarder);

    let local_key = (0..100).find(|k| is_local(&forwarder, *k)).unwrap();

    let mut from_peer = record(local_key);
    from_peer.event_mut().insert("origin", json!("peer"));
    forwarder.stage_received(vec![from_peer]);

    decorated.execute(vec![record(local_key)]).await.unwrap();

    let observed = inner.observed();
    assert_eq!(observed[0].len(), 2);
    assert_eq!(observed[0][0].event().get("origin"), None);
    assert_eq!(observed[0][1].event().get("origin"), Some(&json!("peer")));
    assert_eq!(decorated.records_received(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_drop_without_duplication() {
    let forwarder = Arc::new(ScriptedForwarder::new(true));
    let (inner, decorated) = decorator(&forwarder);

    let local_key = (0..100).find(|k| is_local(&forwarder, *k)).unwrap();
    let remote_key = (0..100).find(|k| !is_local(&forwarder, *k)).unwrap();

    let out = decorated
        .execute(vec![record(remote_key), record(local_key)])
        .await
        .unwrap();

    // All three attempts were made, then the partition was dropped
    assert_eq!(forwarder.send_attempts.load(Ordering::SeqCst), 3);
    assert_eq!(decorated.records_dropped(), 1);
    assert_eq!(decorated.records_forwarded(), 0);

    // The local record was still processed; the dropped one is gone,
    // not rerouted anywhere
    let observed = inner.observed();
    assert_eq!(keys_of(&observed[0]), vec![local_key]);
    assert_eq!(keys_of(&out), vec![local_key]);
}

/// Forwarder whose owner selection comes up empty a configurable number
/// of times before resolving to the local node
struct VacantRingForwarder {
    local: PeerId,
    vacant_selections: AtomicU64,
    selection_calls: AtomicU64,
}

impl VacantRingForwarder {
    fn new(vacant_selections: u64) -> Self {
        Self {
            local: PeerId::new("node-x:4910"),
            vacant_selections: AtomicU64::new(vacant_selections),
            selection_calls: AtomicU64::new(0),
        }
    }

    fn selection_calls(&self) -> u64 {
        self.selection_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerForwarder for VacantRingForwarder {
    fn local_peer(&self) -> &PeerId {
        &self.local
    }

    fn owner_of(&self, _key_hash: u64) -> Option<PeerId> {
        self.selection_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.vacant_selections.load(Ordering::SeqCst);
        if remaining > 0 {
            self.vacant_selections.store(remaining - 1, Ordering::SeqCst);
            None
        } else {
            Some(self.local.clone())
        }
    }

    async fn forward(
        &self,
        _plugin_id: &str,
        peer: &PeerId,
        _records: &[Record],
    ) -> Result<(), PeerForwardError> {
        Err(PeerForwardError::unavailable(peer))
    }

    fn drain_received(&self, _plugin_id: &str) -> Vec<Record> {
        Vec::new()
    }
}

#[tokio::test]
async fn test_empty_peer_set_retries_selection_before_dropping() {
    // Ownership never resolves; every selection attempt in the budget
    // must happen before the record is dropped
    let forwarder = Arc::new(VacantRingForwarder::new(u64::MAX));
    let inner = Arc::new(RecordingProcessor::default());
    let decorated = PeerForwardingProcessor::new(
        Arc::clone(&inner) as Arc<dyn Processor>,
        Arc::clone(&forwarder) as Arc<dyn PeerForwarder>,
        "aggregate_count",
        vec!["k".to_string()],
    )
    .with_retry(3, Duration::from_millis(1));

    decorated.execute(vec![record(1)]).await.unwrap();

    assert_eq!(forwarder.selection_calls(), 3);
    assert_eq!(decorated.records_dropped(), 1);

    // The wrapped processor still ran, on an empty locally-owned set
    let observed = inner.observed();
    assert_eq!(observed.len(), 1);
    assert!(observed[0].is_empty());
}

#[tokio::test]
async fn test_peer_joining_during_selection_recovers_records() {
    // The first two selections find nobody; the third resolves to the
    // local node, so nothing is dropped
    let forwarder = Arc::new(VacantRingForwarder::new(2));
    let inner = Arc::new(RecordingProcessor::default());
    let decorated = PeerForwardingProcessor::new(
        Arc::clone(&inner) as Arc<dyn Processor>,
        Arc::clone(&forwarder) as Arc<dyn PeerForwarder>,
        "aggregate_count",
        vec!["k".to_string()],
    )
    .with_retry(3, Duration::from_millis(1));

    decorated.execute(vec![record(1)]).await.unwrap();

    assert_eq!(forwarder.selection_calls(), 3);
    assert_eq!(decorated.records_dropped(), 0);

    let observed = inner.observed();
    assert_eq!(keys_of(&observed[0]), vec![1]);
}

#[tokio::test]
async fn test_two_node_cluster_partitions_by_key() {
    use tokio_util::sync::CancellationToken;
    use weir_peer::{RemotePeerForwarder, RemotePeerForwarderConfig};

    let shutdown = CancellationToken::new();

    let node_x = RemotePeerForwarder::bind(
        RemotePeerForwarderConfig::new("127.0.0.1:0", vec![])
            .with_request_timeout(Duration::from_secs(1)),
        shutdown.clone(),
    )
    .await
    .unwrap();
    let node_y = RemotePeerForwarder::bind(
        RemotePeerForwarderConfig::new("127.0.0.1:0", vec![node_x.local_peer().clone()])
            .with_request_timeout(Duration::from_secs(1)),
        shutdown.clone(),
    )
    .await
    .unwrap();
    node_x.ring().add(node_y.local_peer().clone());

    let keys = vec!["k".to_string()];
    let hash = |k: i64| weir_model::identification_hash(record(k).event(), &keys);

    // Two keys owned by different nodes; both rings agree on ownership
    let x_key = (0..1000)
        .find(|k| node_x.owner_of(hash(*k)).as_ref() == Some(node_x.local_peer()))
        .unwrap();
    let y_key = (0..1000)
        .find(|k| node_x.owner_of(hash(*k)).as_ref() == Some(node_y.local_peer()))
        .unwrap();

    let inner_x = Arc::new(RecordingProcessor::default());
    let decorated_x = PeerForwardingProcessor::new(
        Arc::clone(&inner_x) as Arc<dyn Processor>,
        Arc::clone(&node_x) as Arc<dyn PeerForwarder>,
        "aggregate_count",
        keys.clone(),
    );

    // Records enter node X only: [x_key, y_key, x_key]
    decorated_x
        .execute(vec![record(x_key), record(y_key), record(x_key)])
        .await
        .unwrap();

    // Node X processed its own keys, in input order
    let observed_x = inner_x.observed();
    assert_eq!(keys_of(&observed_x[0]), vec![x_key, x_key]);

    // Node Y's decorator picks the forwarded record up on its next batch
    let inner_y = Arc::new(RecordingProcessor::default());
    let decorated_y = PeerForwardingProcessor::new(
        Arc::clone(&inner_y) as Arc<dyn Processor>,
        Arc::clone(&node_y) as Arc<dyn PeerForwarder>,
        "aggregate_count",
        keys.clone(),
    );
    decorated_y.execute(Vec::new()).await.unwrap();

    let observed_y = inner_y.observed();
    assert_eq!(keys_of(&observed_y[0]), vec![y_key]);
    assert_eq!(decorated_y.records_received(), 1);

    shutdown.cancel();
}

#[tokio::test]
async fn test_decorator_reports_inner_name() {
    let forwarder = Arc::new(ScriptedForwarder::new(false));
    let (_, decorated) = decorator(&forwarder);
    assert_eq!(decorated.name(), "recording");
    assert_eq!(decorated.plugin_id(), "aggregate_count");
}
