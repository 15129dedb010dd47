//! File sink
//!
//! Appends each record's event as one JSON line to a file. The file is
//! opened lazily on first output so construction stays synchronous.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use weir_model::{PluginKind, PluginSpec, Record, Sink, SinkError};

use crate::error::{PluginLoadError, Result};
use crate::registry::SinkFactory;

/// Configuration for the file sink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file path
    pub path: PathBuf,

    /// Append to an existing file instead of truncating
    pub append: bool,
}

impl TryFrom<&PluginSpec> for FileSinkConfig {
    type Error = String;

    fn try_from(spec: &PluginSpec) -> std::result::Result<Self, Self::Error> {
        let path = spec
            .get_path("path")
            .ok_or_else(|| "missing required field 'path'".to_string())?;
        Ok(Self {
            path,
            append: spec.get_bool("append").unwrap_or(true),
        })
    }
}

/// Sink writing events as JSON lines to a file
pub struct FileSink {
    config: FileSinkConfig,
    file: Mutex<Option<File>>,
}

impl FileSink {
    pub fn new(config: FileSinkConfig) -> Self {
        Self {
            config,
            file: Mutex::new(None),
        }
    }

    async fn open(&self) -> std::result::Result<File, SinkError> {
        OpenOptions::new()
            .create(true)
            .append(self.config.append)
            .write(true)
            .truncate(!self.config.append)
            .open(&self.config.path)
            .await
            .map_err(|e| SinkError::new("file", format!("{}: {}", self.config.path.display(), e)))
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn output(&self, batch: Vec<Record>) -> std::result::Result<(), SinkError> {
        let mut out = String::with_capacity(batch.len() * 64);
        for record in &batch {
            let line =
                serde_json::to_string(record.event()).map_err(|e| SinkError::new("file", e))?;
            out.push_str(&line);
            out.push('\n');
        }

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }
        let file = guard.as_mut().expect("file opened above");

        file.write_all(out.as_bytes())
            .await
            .map_err(|e| SinkError::new("file", e))?;
        file.flush().await.map_err(|e| SinkError::new("file", e))?;
        Ok(())
    }

    async fn close(&self) -> std::result::Result<(), SinkError> {
        let mut guard = self.file.lock().await;
        if let Some(mut file) = guard.take() {
            file.flush().await.map_err(|e| SinkError::new("file", e))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Factory for the file sink
pub struct FileSinkFactory;

impl SinkFactory for FileSinkFactory {
    fn create(&self, spec: &PluginSpec) -> Result<Arc<dyn Sink>> {
        let config = FileSinkConfig::try_from(spec)
            .map_err(|msg| PluginLoadError::invalid_config(PluginKind::Sink, spec.name(), msg))?;
        Ok(Arc::new(FileSink::new(config)))
    }
}
