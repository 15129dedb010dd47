//! Pipeline runtime
//!
//! One running pipeline: a source task feeding the buffer, a pool of
//! worker tasks pulling batches through the stage chain and fanning out
//! to sinks, and cooperative shutdown with a bounded drain grace.
//!
//! # Ordering and delivery
//!
//! - Within one worker, records keep arrival order through the stages
//!   and into the sinks
//! - Across workers no order is guaranteed
//! - Delivery is at-least-once: batches are acknowledged to the buffer
//!   after the sink fan-out

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use weir_model::{Buffer, Processor, Sink, Source};

use crate::metrics::{PipelineMetrics, PipelineMetricsSnapshot};

/// Pipeline lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Built = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
    Failed = 5,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PipelineState::Built,
            1 => PipelineState::Starting,
            2 => PipelineState::Running,
            3 => PipelineState::Stopping,
            4 => PipelineState::Stopped,
            _ => PipelineState::Failed,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineState::Built => "built",
            PipelineState::Starting => "starting",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Stopped => "stopped",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One entry in the processor chain: a plugin realized as one shared
/// instance or one instance per worker.
pub struct ProcessorStage {
    plugin_name: String,
    instances: Vec<Arc<dyn Processor>>,
}

impl ProcessorStage {
    /// Create a stage; `instances` must be non-empty
    pub fn new(plugin_name: impl Into<String>, instances: Vec<Arc<dyn Processor>>) -> Self {
        assert!(!instances.is_empty(), "a stage needs at least one instance");
        Self {
            plugin_name: plugin_name.into(),
            instances,
        }
    }

    /// The plugin name behind this stage
    #[inline]
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// All instances of this stage
    #[inline]
    pub fn instances(&self) -> &[Arc<dyn Processor>] {
        &self.instances
    }

    /// The instance a given worker must call: the shared instance for
    /// single-instance stages, otherwise the worker's own.
    #[inline]
    pub fn instance_for(&self, worker: usize) -> &Arc<dyn Processor> {
        if self.instances.len() == 1 {
            &self.instances[0]
        } else {
            &self.instances[worker % self.instances.len()]
        }
    }
}

/// A runnable pipeline assembled by the builder
pub struct Pipeline {
    name: String,
    source: Arc<dyn Source>,
    buffer: Arc<dyn Buffer>,
    stages: Vec<ProcessorStage>,
    sinks: Vec<Arc<dyn Sink>>,
    workers: usize,
    read_batch_delay: Duration,
    state: AtomicU8,
    stop_started: AtomicBool,
    source_shutdown: CancellationToken,
    worker_shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    /// Assemble a pipeline from built components
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn Source>,
        buffer: Arc<dyn Buffer>,
        stages: Vec<ProcessorStage>,
        sinks: Vec<Arc<dyn Sink>>,
        workers: usize,
        read_batch_delay: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            buffer,
            stages,
            sinks,
            workers: workers.max(1),
            read_batch_delay,
            state: AtomicU8::new(PipelineState::Built as u8),
            stop_started: AtomicBool::new(false),
            source_shutdown: CancellationToken::new(),
            worker_shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// The pipeline name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The source component
    #[inline]
    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    /// The buffer component
    #[inline]
    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }

    /// The processor stages in order
    #[inline]
    pub fn stages(&self) -> &[ProcessorStage] {
        &self.stages
    }

    /// The sinks in fan-out order
    #[inline]
    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }

    /// Configured worker count
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Configured read-batch delay
    #[inline]
    pub fn read_batch_delay(&self) -> Duration {
        self.read_batch_delay
    }

    /// Snapshot of the pipeline's counters
    pub fn metrics(&self) -> PipelineMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn set_state(&self, state: PipelineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Spawn the source task and the worker pool.
    ///
    /// A second call is a no-op on an already-started pipeline.
    pub fn start(self: &Arc<Self>) {
        let transitioned = self
            .state
            .compare_exchange(
                PipelineState::Built as u8,
                PipelineState::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if !transitioned {
            tracing::warn!(pipeline = %self.name, state = %self.state(), "pipeline already started");
            return;
        }

        tracing::info!(
            pipeline = %self.name,
            source = self.source.name(),
            stages = self.stages.len(),
            sinks = self.sinks.len(),
            workers = self.workers,
            "starting pipeline"
        );

        let mut tasks = self.tasks.lock();

        // Source task: its only output side-effect is writing into the
        // buffer; a failure here fails the pipeline while the workers
        // drain what already arrived
        {
            let pipeline = Arc::clone(self);
            let shutdown = self.source_shutdown.clone();
            tasks.push(tokio::spawn(async move {
                let buffer = Arc::clone(&pipeline.buffer);
                if let Err(e) = pipeline.source.start(buffer, shutdown).await {
                    tracing::error!(pipeline = %pipeline.name, error = %e, "source failed");
                    pipeline.set_state(PipelineState::Failed);
                }
            }));
        }

        for worker in 0..self.workers {
            let pipeline = Arc::clone(self);
            tasks.push(tokio::spawn(pipeline.worker_loop(worker)));
        }
        drop(tasks);

        // The source may already have failed; do not mask it
        let _ = self.state.compare_exchange(
            PipelineState::Starting as u8,
            PipelineState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    async fn worker_loop(self: Arc<Self>, worker: usize) {
        tracing::debug!(pipeline = %self.name, worker, "worker starting");

        loop {
            let batch = tokio::select! {
                _ = self.worker_shutdown.cancelled() => break,
                batch = self.buffer.read(self.read_batch_delay) => batch,
            };

            if batch.is_empty() {
                // Drained and the source is gone: this worker is done
                if self.source_shutdown.is_cancelled() && self.buffer.pending() == 0 {
                    break;
                }
                tokio::task::yield_now().await;
                continue;
            }

            let read_count = batch.len();
            self.metrics.record_read(read_count as u64);

            let mut batch = batch;
            let mut dropped = false;
            for stage in &self.stages {
                let processor = stage.instance_for(worker);
                match processor.execute(batch).await {
                    Ok(out) => batch = out,
                    Err(e) => {
                        tracing::warn!(
                            pipeline = %self.name,
                            processor = stage.plugin_name(),
                            worker,
                            error = %e,
                            "processor failed, dropping batch"
                        );
                        self.metrics.record_processor_error();
                        batch = Vec::new();
                        dropped = true;
                        break;
                    }
                }
            }

            if !dropped && !batch.is_empty() {
                let delivered = batch.len();
                let sink_count = self.sinks.len();
                for (index, sink) in self.sinks.iter().enumerate() {
                    let out = if index + 1 == sink_count {
                        std::mem::take(&mut batch)
                    } else {
                        batch.clone()
                    };
                    if let Err(e) = sink.output(out).await {
                        tracing::warn!(
                            pipeline = %self.name,
                            sink = sink.name(),
                            error = %e,
                            "sink delivery failed"
                        );
                        self.metrics.record_sink_error();
                    }
                }
                self.metrics.record_processed(delivered as u64);
            }

            self.buffer.commit(read_count);
        }

        tracing::debug!(pipeline = %self.name, worker, "worker stopped");
    }

    /// Stop the pipeline: signal the source, drain the buffer within
    /// `grace`, then terminate workers and drop whatever remains.
    ///
    /// Idempotent: a second call observes the first call's terminal
    /// state and does not close sinks again.
    pub async fn stop(&self, grace: Duration) -> PipelineState {
        if self.stop_started.swap(true, Ordering::SeqCst) {
            return self.state();
        }

        let was_failed = self.state() == PipelineState::Failed;
        self.set_state(PipelineState::Stopping);
        tracing::info!(pipeline = %self.name, grace_ms = grace.as_millis() as u64, "stopping pipeline");

        self.source_shutdown.cancel();

        let deadline = tokio::time::Instant::now() + grace;
        while self.buffer.pending() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Past the deadline workers are terminated; in-flight sink
        // writes are abandoned, queued records are discarded and counted
        self.worker_shutdown.cancel();
        self.buffer.close();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for handle in handles {
            let abort = handle.abort_handle();
            if tokio::time::timeout(Duration::from_millis(500), handle)
                .await
                .is_err()
            {
                abort.abort();
            }
        }

        let dropped = self.buffer.drain();
        if dropped > 0 {
            self.metrics.record_dropped(dropped as u64);
            tracing::warn!(
                pipeline = %self.name,
                dropped,
                "grace period elapsed, dropping buffered records"
            );
        }

        for sink in &self.sinks {
            if let Err(e) = sink.close().await {
                tracing::warn!(pipeline = %self.name, sink = sink.name(), error = %e, "sink close failed");
            }
        }

        let terminal = if was_failed || self.state() == PipelineState::Failed {
            PipelineState::Failed
        } else {
            PipelineState::Stopped
        };
        self.set_state(terminal);

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            pipeline = %self.name,
            state = %terminal,
            records_read = snapshot.records_read,
            records_processed = snapshot.records_processed,
            processor_errors = snapshot.processor_errors,
            sink_errors = snapshot.sink_errors,
            records_dropped = snapshot.records_dropped,
            "pipeline stopped"
        );

        terminal
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("workers", &self.workers)
            .field("stages", &self.stages.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
