//! File source
//!
//! Reads a file line by line to EOF and writes one record per line into
//! the buffer. Intended for replays and testing; it does not follow the
//! file after EOF.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use weir_model::{Buffer, BufferError, PluginKind, PluginSpec, Source, SourceError};

use super::Codec;
use crate::error::{PluginLoadError, Result};
use crate::registry::SourceFactory;

/// Configuration for the file source
#[derive(Debug, Clone)]
pub struct FileSourceConfig {
    /// File to read
    pub path: PathBuf,

    /// Line decoding (default ndjson)
    pub codec: Codec,

    /// Event type stamped on produced records
    pub event_type: String,
}

impl TryFrom<&PluginSpec> for FileSourceConfig {
    type Error = String;

    fn try_from(spec: &PluginSpec) -> std::result::Result<Self, Self::Error> {
        let path = spec
            .get_path("path")
            .ok_or_else(|| "missing required field 'path'".to_string())?;

        let codec = match spec.get_str("codec") {
            Some(name) => Codec::parse(name)?,
            None => Codec::default(),
        };

        Ok(Self {
            path,
            codec,
            event_type: spec.get_str("event_type").unwrap_or("event").to_string(),
        })
    }
}

/// Source that replays a file through the buffer
pub struct FileSource {
    config: FileSourceConfig,
}

impl FileSource {
    pub fn new(config: FileSourceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Source for FileSource {
    async fn start(
        &self,
        target: Arc<dyn Buffer>,
        shutdown: CancellationToken,
    ) -> std::result::Result<(), SourceError> {
        let file = File::open(&self.config.path)
            .await
            .map_err(|e| SourceError::new("file", format!("{}: {}", self.config.path.display(), e)))?;
        let mut lines = BufReader::new(file).lines();

        let mut produced = 0u64;
        let mut skipped = 0u64;

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e) => return Err(SourceError::new("file", e)),
                    }
                }
            };

            let Some(record) = self.config.codec.decode(&line, &self.config.event_type) else {
                skipped += 1;
                tracing::debug!(path = %self.config.path.display(), "skipping undecodable line");
                continue;
            };

            match target.write(record).await {
                Ok(()) => produced += 1,
                Err(BufferError::Closed) => break,
                Err(BufferError::Full) => {
                    // Non-blocking buffer pushed back; this source has no
                    // replay cursor, so the record is lost
                    skipped += 1;
                }
            }
        }

        tracing::info!(
            path = %self.config.path.display(),
            produced,
            skipped,
            "file source finished"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Factory for the file source
pub struct FileSourceFactory;

impl SourceFactory for FileSourceFactory {
    fn create(&self, spec: &PluginSpec) -> Result<Arc<dyn Source>> {
        let config = FileSourceConfig::try_from(spec)
            .map_err(|msg| PluginLoadError::invalid_config(PluginKind::Source, spec.name(), msg))?;
        Ok(Arc::new(FileSource::new(config)))
    }
}
