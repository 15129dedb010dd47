//! Pipeline runtime tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use weir_model::{
    Buffer, Event, Processor, ProcessorError, Record, Sink, SinkError, Source, SourceError,
};
use weir_plugin::buffer::{BoundedBuffer, BoundedBufferConfig};
use weir_plugin::processor::NoopProcessor;

use super::{Pipeline, PipelineState, ProcessorStage};

fn record(n: i64) -> Record {
    let mut event = Event::new();
    event.insert("n", json!(n));
    Record::new(event, "event")
}

fn values(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|r| r.event().get("n").unwrap().as_i64().unwrap())
        .collect()
}

async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Source that emits a fixed list of records and finishes
struct VecSource {
    records: Mutex<Vec<Record>>,
    produced: AtomicU64,
}

impl VecSource {
    fn new(records: Vec<Record>) -> Self {
        Self {
            records: Mutex::new(records),
            produced: AtomicU64::new(0),
        }
    }

    fn produced(&self) -> u64 {
        self.produced.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for VecSource {
    async fn start(
        &self,
        target: Arc<dyn Buffer>,
        shutdown: CancellationToken,
    ) -> Result<(), SourceError> {
        let records = std::mem::take(&mut *self.records.lock());
        for record in records {
            if shutdown.is_cancelled() {
                break;
            }
            if target.write(record).await.is_err() {
                break;
            }
            self.produced.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "vec"
    }
}

/// Source that fails immediately
struct BrokenSource;

#[async_trait]
impl Source for BrokenSource {
    async fn start(
        &self,
        _target: Arc<dyn Buffer>,
        _shutdown: CancellationToken,
    ) -> Result<(), SourceError> {
        Err(SourceError::new("broken", "refused to start"))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// Sink that collects everything it receives
#[derive(Default)]
struct CollectingSink {
    received: Mutex<Vec<Record>>,
    close_count: AtomicU64,
    delay: Option<Duration>,
}

impl CollectingSink {
    fn new() -> Self {
        Self::default()
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn received(&self) -> Vec<Record> {
        self.received.lock().clone()
    }

    fn received_count(&self) -> usize {
        self.received.lock().len()
    }

    fn close_count(&self) -> u64 {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for CollectingSink {
    async fn output(&self, batch: Vec<Record>) -> Result<(), SinkError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.received.lock().extend(batch);
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "collecting"
    }
}

/// Sink that always fails
struct FailingSink;

#[async_trait]
impl Sink for FailingSink {
    async fn output(&self, _batch: Vec<Record>) -> Result<(), SinkError> {
        Err(SinkError::new("failing", "simulated outage"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Processor that rejects batches containing a poisoned record
struct PoisonProcessor;

#[async_trait]
impl Processor for PoisonProcessor {
    async fn execute(&self, batch: Vec<Record>) -> Result<Vec<Record>, ProcessorError> {
        if batch.iter().any(|r| r.event().get("poison").is_some()) {
            return Err(ProcessorError::new("poison", "poisoned batch"));
        }
        Ok(batch)
    }

    fn name(&self) -> &str {
        "poison"
    }
}

fn buffer(capacity: usize, batch_size: usize) -> Arc<dyn Buffer> {
    Arc::new(BoundedBuffer::new(BoundedBufferConfig {
        capacity,
        batch_size,
        blocking: true,
    }))
}

fn noop_stage() -> ProcessorStage {
    ProcessorStage::new("noop", vec![Arc::new(NoopProcessor::new()) as Arc<dyn Processor>])
}

#[tokio::test]
async fn test_records_flow_source_to_sink_in_order() {
    let source = Arc::new(VecSource::new((0..10).map(record).collect()));
    let sink = Arc::new(CollectingSink::new());

    let pipeline = Arc::new(Pipeline::new(
        "flow",
        Arc::clone(&source) as Arc<dyn Source>,
        buffer(64, 16),
        vec![noop_stage()],
        vec![Arc::clone(&sink) as Arc<dyn Sink>],
        1,
        Duration::from_millis(10),
    ));

    pipeline.start();
    assert!(wait_until(|| sink.received_count() == 10).await);

    // Single worker keeps arrival order end to end
    assert_eq!(values(&sink.received()), (0..10).collect::<Vec<_>>());

    let state = pipeline.stop(Duration::from_millis(500)).await;
    assert_eq!(state, PipelineState::Stopped);
    assert_eq!(pipeline.metrics().records_processed, 10);
    assert_eq!(pipeline.metrics().records_dropped, 0);
}

#[tokio::test]
async fn test_processor_error_drops_batch_worker_continues() {
    let mut poisoned = record(0);
    poisoned.event_mut().insert("poison", json!(true));

    // batch_size 1 isolates each record in its own batch
    let source = Arc::new(VecSource::new(vec![poisoned, record(1), record(2)]));
    let sink = Arc::new(CollectingSink::new());

    let pipeline = Arc::new(Pipeline::new(
        "poisoned",
        Arc::clone(&source) as Arc<dyn Source>,
        buffer(64, 1),
        vec![ProcessorStage::new(
            "poison",
            vec![Arc::new(PoisonProcessor) as Arc<dyn Processor>],
        )],
        vec![Arc::clone(&sink) as Arc<dyn Sink>],
        1,
        Duration::from_millis(10),
    ));

    pipeline.start();
    assert!(wait_until(|| sink.received_count() == 2).await);

    assert_eq!(values(&sink.received()), vec![1, 2]);
    assert_eq!(pipeline.metrics().processor_errors, 1);

    pipeline.stop(Duration::from_millis(500)).await;
}

#[tokio::test]
async fn test_sink_failure_does_not_stop_fanout() {
    let source = Arc::new(VecSource::new((0..5).map(record).collect()));
    let healthy = Arc::new(CollectingSink::new());

    let pipeline = Arc::new(Pipeline::new(
        "fanout",
        Arc::clone(&source) as Arc<dyn Source>,
        buffer(64, 16),
        Vec::new(),
        vec![
            Arc::new(FailingSink) as Arc<dyn Sink>,
            Arc::clone(&healthy) as Arc<dyn Sink>,
        ],
        1,
        Duration::from_millis(10),
    ));

    pipeline.start();
    assert!(wait_until(|| healthy.received_count() == 5).await);

    assert!(pipeline.metrics().sink_errors >= 1);
    pipeline.stop(Duration::from_millis(500)).await;
}

#[tokio::test]
async fn test_stop_is_idempotent_and_closes_sinks_once() {
    let source = Arc::new(VecSource::new((0..3).map(record).collect()));
    let sink = Arc::new(CollectingSink::new());

    let pipeline = Arc::new(Pipeline::new(
        "stopper",
        Arc::clone(&source) as Arc<dyn Source>,
        buffer(64, 16),
        vec![noop_stage()],
        vec![Arc::clone(&sink) as Arc<dyn Sink>],
        2,
        Duration::from_millis(10),
    ));

    pipeline.start();
    assert!(wait_until(|| sink.received_count() == 3).await);

    let first = pipeline.stop(Duration::from_millis(500)).await;
    let second = pipeline.stop(Duration::from_millis(500)).await;

    assert_eq!(first, PipelineState::Stopped);
    assert_eq!(second, first);
    assert_eq!(sink.close_count(), 1);
}

#[tokio::test]
async fn test_backpressure_without_loss() {
    // Source outruns a sink that naps on every batch; the capacity-10
    // buffer pushes back and nothing written is lost
    let source = Arc::new(VecSource::new((0..50).map(record).collect()));
    let sink = Arc::new(CollectingSink::slow(Duration::from_millis(5)));

    let pipeline = Arc::new(Pipeline::new(
        "pressured",
        Arc::clone(&source) as Arc<dyn Source>,
        buffer(10, 10),
        vec![noop_stage()],
        vec![Arc::clone(&sink) as Arc<dyn Sink>],
        1,
        Duration::from_millis(5),
    ));

    pipeline.start();
    assert!(wait_until(|| sink.received_count() == 50).await);

    let state = pipeline.stop(Duration::from_secs(2)).await;
    assert_eq!(state, PipelineState::Stopped);
    assert_eq!(source.produced(), 50);
    assert_eq!(sink.received_count(), 50);
    assert_eq!(pipeline.metrics().records_dropped, 0);
}

#[tokio::test]
async fn test_exhausted_grace_drops_at_most_capacity() {
    // A sink slow enough that the buffer stays full at stop time
    let source = Arc::new(VecSource::new((0..50).map(record).collect()));
    let sink = Arc::new(CollectingSink::slow(Duration::from_millis(200)));

    let pipeline = Arc::new(Pipeline::new(
        "impatient",
        Arc::clone(&source) as Arc<dyn Source>,
        buffer(10, 5),
        Vec::new(),
        vec![Arc::clone(&sink) as Arc<dyn Sink>],
        1,
        Duration::from_millis(5),
    ));

    pipeline.start();
    assert!(wait_until(|| sink.received_count() >= 5).await);

    let state = pipeline.stop(Duration::ZERO).await;
    assert_eq!(state, PipelineState::Stopped);

    let dropped = pipeline.metrics().records_dropped;
    assert!(dropped <= 10, "dropped {} exceeds buffer capacity", dropped);

    // Accounting closes: everything written was delivered, dropped, or
    // abandoned in the one in-flight batch
    let delivered = sink.received_count() as u64;
    assert!(delivered + dropped <= source.produced());
    assert!(source.produced() - (delivered + dropped) <= 5);
}

#[tokio::test]
async fn test_source_failure_fails_pipeline() {
    let sink = Arc::new(CollectingSink::new());
    let pipeline = Arc::new(Pipeline::new(
        "doomed",
        Arc::new(BrokenSource) as Arc<dyn Source>,
        buffer(8, 8),
        Vec::new(),
        vec![Arc::clone(&sink) as Arc<dyn Sink>],
        1,
        Duration::from_millis(10),
    ));

    pipeline.start();
    assert!(wait_until(|| pipeline.state() == PipelineState::Failed).await);

    // Stop keeps the failed terminal state
    let state = pipeline.stop(Duration::from_millis(100)).await;
    assert_eq!(state, PipelineState::Failed);
}

#[tokio::test]
async fn test_start_twice_is_noop() {
    let source = Arc::new(VecSource::new((0..3).map(record).collect()));
    let sink = Arc::new(CollectingSink::new());

    let pipeline = Arc::new(Pipeline::new(
        "restarted",
        Arc::clone(&source) as Arc<dyn Source>,
        buffer(16, 8),
        Vec::new(),
        vec![Arc::clone(&sink) as Arc<dyn Sink>],
        1,
        Duration::from_millis(10),
    ));

    pipeline.start();
    pipeline.start();
    assert!(wait_until(|| sink.received_count() == 3).await);

    // A second start spawned no duplicate workers or sources
    assert_eq!(sink.received_count(), 3);
    pipeline.stop(Duration::from_millis(500)).await;
}

#[test]
fn test_stage_instance_assignment() {
    let instances: Vec<Arc<dyn Processor>> = (0..4)
        .map(|_| Arc::new(NoopProcessor::new()) as Arc<dyn Processor>)
        .collect();
    let stage = ProcessorStage::new("noop", instances);

    // Each worker gets its own instance, exclusively
    for worker in 0..4 {
        assert!(Arc::ptr_eq(stage.instance_for(worker), &stage.instances()[worker]));
    }
    // Worker indices wrap rather than panic
    assert!(Arc::ptr_eq(stage.instance_for(6), &stage.instances()[2]));

    let shared = ProcessorStage::new(
        "noop",
        vec![Arc::new(NoopProcessor::new()) as Arc<dyn Processor>],
    );
    for worker in 0..4 {
        assert!(Arc::ptr_eq(shared.instance_for(worker), &shared.instances()[0]));
    }
}
