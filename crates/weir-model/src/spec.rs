//! Plugin specification
//!
//! A [`PluginSpec`] is the parsed configuration for one plugin slot: the
//! plugin name plus an untyped attribute table that the plugin's factory
//! interprets. Typed getters mirror how attributes are declared in the
//! topology document.

use std::path::PathBuf;
use std::time::Duration;

/// Plugin name denoting an in-process link to another pipeline.
///
/// A spec `{ pipeline = { name = "other" } }` is not a real plugin: the
/// builder resolves it to a shared connector between the two pipelines.
pub const PIPELINE_PLUGIN: &str = "pipeline";

/// A plugin name plus its configuration attributes.
///
/// Specs are owned by the topology model and immutable after parse.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSpec {
    name: String,
    settings: toml::Table,
}

impl PluginSpec {
    /// Create a spec from a name and attribute table
    pub fn new(name: impl Into<String>, settings: toml::Table) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }

    /// Create a spec with no attributes
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, toml::Table::new())
    }

    /// The plugin name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw attribute table
    #[inline]
    pub fn settings(&self) -> &toml::Table {
        &self.settings
    }

    /// If this spec is a `pipeline` link, the linked pipeline's name
    pub fn pipeline_link(&self) -> Option<&str> {
        if self.name == PIPELINE_PLUGIN {
            self.get_str("name")
        } else {
            None
        }
    }

    /// Get an attribute as a string slice
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    /// Get an attribute as i64
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.settings.get(key).and_then(|v| v.as_integer())
    }

    /// Get an attribute as bool
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.settings.get(key).and_then(|v| v.as_bool())
    }

    /// Get an attribute as f64
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.settings.get(key).and_then(|v| v.as_float())
    }

    /// Get an array attribute as Vec<String>
    pub fn get_string_array(&self, key: &str) -> Option<Vec<String>> {
        self.settings.get(key).and_then(|v| {
            v.as_array().map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
        })
    }

    /// Get an attribute as PathBuf
    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get_str(key).map(PathBuf::from)
    }

    /// Get a duration-string attribute (e.g. "3s", "100ms")
    pub fn get_duration(&self, key: &str) -> Option<Duration> {
        self.get_str(key)
            .and_then(|s| humantime::parse_duration(s).ok())
    }
}
