//! Bounded in-memory buffer
//!
//! The default buffer: a bounded channel between the source and the
//! worker pool. Writers block when the buffer is at capacity
//! (backpressure), or fail fast with `BufferError::Full` when configured
//! non-blocking. Readers accumulate a batch up to `batch_size`, waiting
//! at most the pipeline's read-batch delay.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use weir_model::{Buffer, BufferError, PluginKind, PluginSpec, Record};

use crate::error::{PluginLoadError, Result};
use crate::registry::BufferFactory;

/// Configuration for the bounded buffer
#[derive(Debug, Clone)]
pub struct BoundedBufferConfig {
    /// Maximum queued records before writes block (or fail)
    pub capacity: usize,

    /// Maximum records handed out per read
    pub batch_size: usize,

    /// Whether writes wait for capacity or fail with `Full`
    pub blocking: bool,
}

impl Default for BoundedBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 512,
            batch_size: 256,
            blocking: true,
        }
    }
}

impl BoundedBufferConfig {
    /// Validate config consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be positive".into());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be positive".into());
        }
        if self.batch_size > self.capacity {
            return Err(format!(
                "batch_size ({}) cannot exceed capacity ({})",
                self.batch_size, self.capacity
            ));
        }
        Ok(())
    }
}

impl TryFrom<&PluginSpec> for BoundedBufferConfig {
    type Error = String;

    fn try_from(spec: &PluginSpec) -> std::result::Result<Self, Self::Error> {
        let mut config = BoundedBufferConfig::default();

        if let Some(capacity) = spec.get_int("capacity") {
            if capacity <= 0 {
                return Err("capacity must be positive".into());
            }
            config.capacity = capacity as usize;
        }
        if let Some(batch_size) = spec.get_int("batch_size") {
            if batch_size <= 0 {
                return Err("batch_size must be positive".into());
            }
            config.batch_size = batch_size as usize;
        }
        if let Some(blocking) = spec.get_bool("blocking") {
            config.blocking = blocking;
        }

        // batch_size defaults above capacity for tiny buffers; clamp
        // rather than reject when the user only set capacity
        if config.batch_size > config.capacity && spec.get_int("batch_size").is_none() {
            config.batch_size = config.capacity;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Bounded in-memory buffer backed by a channel.
///
/// Accounting:
/// - `queued` counts records written but not yet read
/// - `in_flight` counts records read but not yet committed
/// - `pending()` is their sum, which shutdown drains against
pub struct BoundedBuffer {
    tx: mpsc::Sender<Record>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Record>>,
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    closed: AtomicBool,
    batch_size: usize,
    blocking: bool,
}

impl BoundedBuffer {
    /// Create a buffer from config
    pub fn new(config: BoundedBufferConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity);
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            queued: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            batch_size: config.batch_size,
            blocking: config.blocking,
        }
    }

    /// Create a buffer with default config
    pub fn with_defaults() -> Self {
        Self::new(BoundedBufferConfig::default())
    }

    /// Maximum records per read
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[async_trait]
impl Buffer for BoundedBuffer {
    async fn write(&self, record: Record) -> std::result::Result<(), BufferError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BufferError::Closed);
        }

        // Count before sending so a concurrent reader never observes a
        // record it could pop as uncounted; roll back on failure
        self.queued.fetch_add(1, Ordering::AcqRel);

        let result = if self.blocking {
            self.tx.send(record).await.map_err(|_| BufferError::Closed)
        } else {
            self.tx.try_send(record).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => BufferError::Full,
                mpsc::error::TrySendError::Closed(_) => BufferError::Closed,
            })
        };

        if let Err(e) = result {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(e);
        }
        Ok(())
    }

    async fn read(&self, max_wait: Duration) -> Vec<Record> {
        let mut rx = self.rx.lock().await;
        let deadline = Instant::now() + max_wait;
        let mut batch = Vec::new();

        while batch.len() < self.batch_size {
            // Once something is queued, take it without waiting; only an
            // empty buffer waits out the remaining delay.
            match rx.try_recv() {
                Ok(record) => {
                    // in_flight up before queued down, so pending() never
                    // transiently undercounts during shutdown drain
                    self.in_flight.fetch_add(1, Ordering::AcqRel);
                    self.queued.fetch_sub(1, Ordering::AcqRel);
                    batch.push(record);
                    continue;
                }
                Err(mpsc::error::TryRecvError::Disconnected) => break,
                Err(mpsc::error::TryRecvError::Empty) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(record)) => {
                    self.in_flight.fetch_add(1, Ordering::AcqRel);
                    self.queued.fetch_sub(1, Ordering::AcqRel);
                    batch.push(record);
                }
                // Channel closed or wait elapsed
                Ok(None) | Err(_) => break,
            }
        }

        batch
    }

    fn commit(&self, read_count: usize) {
        self.in_flight.fetch_sub(read_count, Ordering::AcqRel);
    }

    fn pending(&self) -> usize {
        self.queued.load(Ordering::Acquire) + self.in_flight.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn drain(&self) -> usize {
        let mut dropped = 0;
        if let Ok(mut rx) = self.rx.try_lock() {
            while rx.try_recv().is_ok() {
                self.queued.fetch_sub(1, Ordering::AcqRel);
                dropped += 1;
            }
        }
        dropped
    }
}

/// Factory for the bounded buffer
pub struct BoundedBufferFactory;

impl BufferFactory for BoundedBufferFactory {
    fn create(&self, spec: &PluginSpec) -> Result<std::sync::Arc<dyn Buffer>> {
        let config = BoundedBufferConfig::try_from(spec)
            .map_err(|msg| PluginLoadError::invalid_config(PluginKind::Buffer, spec.name(), msg))?;
        Ok(std::sync::Arc::new(BoundedBuffer::new(config)))
    }
}

#[cfg(test)]
#[path = "bounded_test.rs"]
mod tests;
