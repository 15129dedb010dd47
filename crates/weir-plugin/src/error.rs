//! Plugin load errors

use thiserror::Error;

use weir_model::PluginKind;

/// Result type for plugin construction
pub type Result<T> = std::result::Result<T, PluginLoadError>;

/// Failure to turn a plugin spec into a live instance.
///
/// Fatal for the containing pipeline only; the builder unwinds the
/// pipeline's connected component and keeps going.
#[derive(Debug, Error)]
pub enum PluginLoadError {
    /// No factory registered under this name
    #[error("unknown {kind} plugin '{name}', available: [{available}]")]
    Unknown {
        kind: PluginKind,
        name: String,
        available: String,
    },

    /// The factory rejected the spec's attributes
    #[error("{kind} plugin '{name}' rejected configuration: {message}")]
    InvalidConfig {
        kind: PluginKind,
        name: String,
        message: String,
    },

    /// The constructor itself failed (I/O, resource limits, ...)
    #[error("failed to construct {kind} plugin '{name}': {message}")]
    Construction {
        kind: PluginKind,
        name: String,
        message: String,
    },
}

impl PluginLoadError {
    /// Create an Unknown error listing the registered names
    pub fn unknown(kind: PluginKind, name: impl Into<String>, mut available: Vec<&str>) -> Self {
        available.sort_unstable();
        Self::Unknown {
            kind,
            name: name.into(),
            available: available.join(", "),
        }
    }

    /// Create an InvalidConfig error
    pub fn invalid_config(
        kind: PluginKind,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a Construction error
    pub fn construction(
        kind: PluginKind,
        name: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::Construction {
            kind,
            name: name.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_lists_available() {
        let err = PluginLoadError::unknown(PluginKind::Sink, "kafka", vec!["stdout", "null", "file"]);
        let text = err.to_string();
        assert!(text.contains("kafka"));
        assert!(text.contains("file, null, stdout"));
    }

    #[test]
    fn test_invalid_config_display() {
        let err = PluginLoadError::invalid_config(PluginKind::Buffer, "bounded", "capacity must be positive");
        assert!(err.to_string().contains("bounded"));
        assert!(err.to_string().contains("capacity must be positive"));
    }
}
