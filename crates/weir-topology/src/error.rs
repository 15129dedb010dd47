//! Topology error types

use std::io;

use thiserror::Error;

/// Errors from loading or validating a topology document.
///
/// All of these are fatal at startup: an invalid topology never reaches
/// the builder.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Failed to read the topology file
    #[error("failed to read topology file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to parse the document (includes duplicate keys)
    #[error("failed to parse topology: {0}")]
    Parse(#[from] toml::de::Error),

    /// The document defines no pipelines
    #[error("topology defines no pipelines")]
    Empty,

    /// A pipeline name is empty
    #[error("pipeline names must be non-empty")]
    EmptyPipelineName,

    /// A required field is missing
    #[error("pipeline '{pipeline}' is missing required field '{field}'")]
    MissingField {
        pipeline: String,
        field: &'static str,
    },

    /// A field has an invalid value
    #[error("pipeline '{pipeline}' has invalid {field}: {message}")]
    InvalidField {
        pipeline: String,
        field: &'static str,
        message: String,
    },

    /// A `pipeline` link names a pipeline that does not exist
    #[error("pipeline '{pipeline}' references unknown pipeline '{referenced}'")]
    UnknownPipeline { pipeline: String, referenced: String },

    /// The inter-pipeline reference graph has a cycle
    #[error("topology contains a cycle: {}", .pipelines.join(" -> "))]
    Cycle { pipelines: Vec<String> },
}

impl TopologyError {
    /// Create a MissingField error
    pub fn missing_field(pipeline: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            pipeline: pipeline.into(),
            field,
        }
    }

    /// Create an InvalidField error
    pub fn invalid_field(
        pipeline: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            pipeline: pipeline.into(),
            field,
            message: message.into(),
        }
    }

    /// Create an UnknownPipeline error
    pub fn unknown_pipeline(pipeline: impl Into<String>, referenced: impl Into<String>) -> Self {
        Self::UnknownPipeline {
            pipeline: pipeline.into(),
            referenced: referenced.into(),
        }
    }
}
