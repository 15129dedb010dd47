//! Pipeline connector
//!
//! The in-process link between two pipelines: one object that is a sink
//! in the upstream pipeline and the source of the downstream pipeline.
//!
//! The connector is keyed by its downstream pipeline (fixed at
//! construction) and learns which pipeline feeds it when the builder
//! wires the upstream side. As a source it does not produce anything
//! itself; starting it captures the downstream buffer as the write
//! target, and the sink side pushes records through that buffer's
//! ordinary write path, so backpressure behaves exactly as if the
//! upstream wrote to the buffer directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use weir_model::{Buffer, BufferError, Record, Sink, SinkError, Source, SourceError};

/// Dual-role object linking an upstream pipeline's sink slot to a
/// downstream pipeline's source slot.
///
/// At most one connector exists per downstream pipeline; several
/// upstreams sinking into the same downstream share it.
pub struct PipelineConnector {
    /// The pipeline this connector feeds (fixed at construction)
    downstream: String,

    /// The pipeline writing into this connector (set at wiring)
    upstream: Mutex<Option<String>>,

    /// The downstream buffer, captured when the downstream starts
    target: RwLock<Option<Arc<dyn Buffer>>>,

    /// Set while the downstream pipeline is not accepting records
    closed: AtomicBool,
}

impl PipelineConnector {
    /// Create a connector for the named downstream pipeline
    pub fn new(downstream: impl Into<String>) -> Self {
        Self {
            downstream: downstream.into(),
            upstream: Mutex::new(None),
            target: RwLock::new(None),
            closed: AtomicBool::new(true),
        }
    }

    /// The downstream pipeline's name
    #[inline]
    pub fn downstream_name(&self) -> &str {
        &self.downstream
    }

    /// The most recently wired upstream pipeline, if any
    pub fn upstream_name(&self) -> Option<String> {
        self.upstream.lock().clone()
    }

    /// Record which pipeline feeds this connector
    pub fn set_upstream(&self, upstream: impl Into<String>) {
        *self.upstream.lock() = Some(upstream.into());
    }

    /// Whether the downstream side is currently accepting records
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Source for PipelineConnector {
    /// Capture the downstream buffer and stay alive until shutdown.
    ///
    /// Records arrive through the sink side, so this "source" produces
    /// nothing; it only opens the write path, then marks it closed again
    /// when the downstream pipeline stops.
    async fn start(
        &self,
        target: Arc<dyn Buffer>,
        shutdown: CancellationToken,
    ) -> std::result::Result<(), SourceError> {
        *self.target.write() = Some(target);
        self.closed.store(false, Ordering::Release);

        tracing::debug!(
            downstream = %self.downstream,
            upstream = ?self.upstream_name(),
            "pipeline connector opened"
        );

        shutdown.cancelled().await;

        self.closed.store(true, Ordering::Release);
        tracing::debug!(downstream = %self.downstream, "pipeline connector closed");
        Ok(())
    }

    fn name(&self) -> &str {
        "pipeline"
    }
}

#[async_trait]
impl Sink for PipelineConnector {
    /// Enqueue records into the downstream buffer through the same write
    /// path as any other source.
    async fn output(&self, batch: Vec<Record>) -> std::result::Result<(), SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::new(
                "pipeline",
                format!("downstream pipeline '{}' is not running", self.downstream),
            ));
        }

        // Clone out of the lock; buffer writes must not hold it
        let target = self.target.read().clone();
        let Some(target) = target else {
            return Err(SinkError::new(
                "pipeline",
                format!("downstream pipeline '{}' is not wired", self.downstream),
            ));
        };

        target.write_all(batch).await.map_err(|e| match e {
            BufferError::Full => SinkError::new(
                "pipeline",
                format!("buffer of downstream pipeline '{}' is full", self.downstream),
            ),
            BufferError::Closed => SinkError::new(
                "pipeline",
                format!("buffer of downstream pipeline '{}' is closed", self.downstream),
            ),
        })
    }

    /// The upstream closing its sinks must not tear down the downstream
    /// pipeline, which owns its own lifecycle (and may have other
    /// upstreams). Nothing to do here.
    async fn close(&self) -> std::result::Result<(), SinkError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "pipeline"
    }
}
