//! Per-pipeline metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one running pipeline
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Records read from the buffer by workers
    pub records_read: AtomicU64,

    /// Records delivered to at least one sink
    pub records_processed: AtomicU64,

    /// Batches dropped by failing processors
    pub processor_errors: AtomicU64,

    /// Failed sink deliveries
    pub sink_errors: AtomicU64,

    /// Records dropped at shutdown after the grace period
    pub records_dropped: AtomicU64,
}

impl PipelineMetrics {
    /// Create a zeroed metrics instance
    pub const fn new() -> Self {
        Self {
            records_read: AtomicU64::new(0),
            records_processed: AtomicU64::new(0),
            processor_errors: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
        }
    }

    /// Record a batch read from the buffer
    #[inline]
    pub fn record_read(&self, count: u64) {
        self.records_read.fetch_add(count, Ordering::Relaxed);
    }

    /// Record records delivered through the sink fan-out
    #[inline]
    pub fn record_processed(&self, count: u64) {
        self.records_processed.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a batch dropped by a failing processor
    #[inline]
    pub fn record_processor_error(&self) {
        self.processor_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed sink delivery
    #[inline]
    pub fn record_sink_error(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record records dropped at shutdown
    #[inline]
    pub fn record_dropped(&self, count: u64) {
        self.records_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time snapshot
    pub fn snapshot(&self) -> PipelineMetricsSnapshot {
        PipelineMetricsSnapshot {
            records_read: self.records_read.load(Ordering::Relaxed),
            records_processed: self.records_processed.load(Ordering::Relaxed),
            processor_errors: self.processor_errors.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of pipeline metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineMetricsSnapshot {
    pub records_read: u64,
    pub records_processed: u64,
    pub processor_errors: u64,
    pub sink_errors: u64,
    pub records_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = PipelineMetrics::new();
        metrics.record_read(10);
        metrics.record_processed(8);
        metrics.record_processor_error();
        metrics.record_sink_error();
        metrics.record_dropped(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_read, 10);
        assert_eq!(snapshot.records_processed, 8);
        assert_eq!(snapshot.processor_errors, 1);
        assert_eq!(snapshot.sink_errors, 1);
        assert_eq!(snapshot.records_dropped, 2);
    }
}
