//! Stdin source
//!
//! Reads lines from standard input until EOF or shutdown. Useful for
//! piping data into a topology from the shell.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use weir_model::{Buffer, BufferError, PluginKind, PluginSpec, Source, SourceError};

use super::Codec;
use crate::error::{PluginLoadError, Result};
use crate::registry::SourceFactory;

/// Source reading newline-delimited input from stdin
pub struct StdinSource {
    codec: Codec,
    event_type: String,
}

impl StdinSource {
    pub fn new(codec: Codec, event_type: impl Into<String>) -> Self {
        Self {
            codec,
            event_type: event_type.into(),
        }
    }
}

#[async_trait]
impl Source for StdinSource {
    async fn start(
        &self,
        target: Arc<dyn Buffer>,
        shutdown: CancellationToken,
    ) -> std::result::Result<(), SourceError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut produced = 0u64;

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e) => return Err(SourceError::new("stdin", e)),
                    }
                }
            };

            let Some(record) = self.codec.decode(&line, &self.event_type) else {
                continue;
            };

            match target.write(record).await {
                Ok(()) => produced += 1,
                Err(BufferError::Closed) => break,
                Err(BufferError::Full) => {}
            }
        }

        tracing::info!(produced, "stdin source finished");
        Ok(())
    }

    fn name(&self) -> &str {
        "stdin"
    }
}

/// Factory for the stdin source
pub struct StdinSourceFactory;

impl SourceFactory for StdinSourceFactory {
    fn create(&self, spec: &PluginSpec) -> Result<Arc<dyn Source>> {
        let codec = match spec.get_str("codec") {
            Some(name) => Codec::parse(name).map_err(|msg| {
                PluginLoadError::invalid_config(PluginKind::Source, spec.name(), msg)
            })?,
            None => Codec::Plaintext,
        };
        let event_type = spec.get_str("event_type").unwrap_or("event").to_string();
        Ok(Arc::new(StdinSource::new(codec, event_type)))
    }
}
