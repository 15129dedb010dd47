//! Error and control-signal types shared by the plugin contracts

use thiserror::Error;

/// Buffer control signals.
///
/// These are flow-control outcomes, not failures: `Full` is backpressure
/// from a non-blocking buffer, `Closed` means the pipeline is shutting
/// down. Neither should be logged at error level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// The buffer is at capacity and configured non-blocking
    #[error("buffer full")]
    Full,

    /// The buffer no longer accepts writes
    #[error("buffer closed")]
    Closed,
}

/// A runtime failure inside a processor.
///
/// The worker logs it, drops the offending batch, and continues.
#[derive(Debug, Error)]
#[error("processor '{processor}' failed: {message}")]
pub struct ProcessorError {
    processor: String,
    message: String,
}

impl ProcessorError {
    pub fn new(processor: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            processor: processor.into(),
            message: message.to_string(),
        }
    }

    pub fn processor(&self) -> &str {
        &self.processor
    }
}

/// A delivery failure in a sink.
///
/// Logged and counted; other sinks in the same fan-out still run.
#[derive(Debug, Error)]
#[error("sink '{sink}' failed: {message}")]
pub struct SinkError {
    sink: String,
    message: String,
}

impl SinkError {
    pub fn new(sink: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            sink: sink.into(),
            message: message.to_string(),
        }
    }

    pub fn sink(&self) -> &str {
        &self.sink
    }
}

/// A failure in a source's produce loop.
///
/// Fails the owning pipeline; workers drain what was already buffered.
#[derive(Debug, Error)]
#[error("source '{source_name}' failed: {message}")]
pub struct SourceError {
    source_name: String,
    message: String,
}

impl SourceError {
    pub fn new(source: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            source_name: source.into(),
            message: message.to_string(),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(BufferError::Full.to_string(), "buffer full");
        assert_eq!(BufferError::Closed.to_string(), "buffer closed");

        let err = ProcessorError::new("parse_json", "not an object");
        assert!(err.to_string().contains("parse_json"));
        assert!(err.to_string().contains("not an object"));

        let err = SinkError::new("file", "disk full");
        assert!(err.to_string().contains("file"));

        let err = SourceError::new("stdin", "read failed");
        assert!(err.to_string().contains("stdin"));
    }
}
