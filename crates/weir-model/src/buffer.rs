//! Buffer contract
//!
//! The buffer is the only object in a pipeline that is concurrently read
//! and written; thread-safety is part of this contract. The source (or an
//! upstream pipeline's connector) writes, the worker pool reads, and
//! workers acknowledge consumed batches with [`Buffer::commit`].

use std::time::Duration;

use async_trait::async_trait;

use crate::{BufferError, Record};

/// A bounded, thread-safe queue between a source and processor workers.
///
/// Delivery is at-least-once: a record counts as in-flight from the
/// moment `read` hands it out until the batch it arrived in is committed.
/// [`Buffer::pending`] reports queued plus in-flight records, which is
/// what shutdown drains against.
#[async_trait]
pub trait Buffer: Send + Sync {
    /// Write one record.
    ///
    /// Blocks while the buffer is at capacity (backpressure), or returns
    /// [`BufferError::Full`] if the buffer is configured non-blocking.
    /// Returns [`BufferError::Closed`] after `close`.
    async fn write(&self, record: Record) -> Result<(), BufferError>;

    /// Write a batch of records through the same path as `write`.
    async fn write_all(&self, records: Vec<Record>) -> Result<(), BufferError> {
        for record in records {
            self.write(record).await?;
        }
        Ok(())
    }

    /// Read a batch, waiting up to `max_wait` to accumulate one.
    ///
    /// Returns whatever was available when the wait elapsed, possibly
    /// empty. Batch size is buffer-defined.
    async fn read(&self, max_wait: Duration) -> Vec<Record>;

    /// Acknowledge a batch previously returned by `read`.
    ///
    /// `read_count` is the size of the batch as read (processors may have
    /// since grown or shrunk it).
    fn commit(&self, read_count: usize);

    /// Queued plus read-but-uncommitted records
    fn pending(&self) -> usize;

    /// Stop accepting writes; readers may continue draining
    fn close(&self);

    /// Discard all queued records, returning how many were dropped
    fn drain(&self) -> usize;
}
