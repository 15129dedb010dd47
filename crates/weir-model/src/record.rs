//! Record envelope
//!
//! A [`Record`] wraps an [`Event`] together with metadata (timestamp and
//! event type). Records are what sources produce, buffers queue,
//! processors transform, and sinks deliver. The runtime treats the event
//! payload as opaque.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xxhash_rust::xxh3::xxh3_64;

/// An event payload: a flat JSON object of named fields.
///
/// The pipeline core never looks inside an event; processors read and
/// mutate fields through [`Event::get`] and [`Event::insert`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    fields: serde_json::Map<String, Value>,
}

impl Event {
    /// Create an empty event
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an event from an existing field map
    pub fn from_fields(fields: serde_json::Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Get a field by name
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field as a string slice, if it is a string
    #[inline]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    /// Insert or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Remove a field, returning its previous value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Iterate over all fields
    pub fn fields(&self) -> &serde_json::Map<String, Value> {
        &self.fields
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the event has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Metadata carried alongside every event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// When the record entered the system
    pub timestamp: DateTime<Utc>,

    /// Event type tag (e.g. "event", "log", "metric")
    pub event_type: String,
}

/// The envelope that flows through pipelines: an event plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    event: Event,
    metadata: RecordMetadata,
}

impl Record {
    /// Create a record with the current timestamp
    pub fn new(event: Event, event_type: impl Into<String>) -> Self {
        Self {
            event,
            metadata: RecordMetadata {
                timestamp: Utc::now(),
                event_type: event_type.into(),
            },
        }
    }

    /// Override the record timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.metadata.timestamp = timestamp;
        self
    }

    /// The event payload
    #[inline]
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Mutable access to the event payload
    #[inline]
    pub fn event_mut(&mut self) -> &mut Event {
        &mut self.event
    }

    /// The record metadata
    #[inline]
    pub fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    /// Consume the record, returning the event payload
    pub fn into_event(self) -> Event {
        self.event
    }
}

/// Hash the values of the given identification keys into a stable 64-bit
/// partition key.
///
/// The hash is deterministic across processes and hosts, so every node in
/// a cluster resolves the same record to the same owner. Missing keys
/// hash as null, so records lacking a key still land consistently.
pub fn identification_hash(event: &Event, keys: &[String]) -> u64 {
    let mut buf = Vec::with_capacity(keys.len() * 16);
    for key in keys {
        buf.extend_from_slice(key.as_bytes());
        buf.push(0xff);
        match event.get(key) {
            Some(value) => {
                // Canonical JSON text of the value; key order inside
                // nested objects is preserved by serde_json::Map.
                buf.extend_from_slice(value.to_string().as_bytes());
            }
            None => buf.extend_from_slice(b"null"),
        }
        buf.push(0xfe);
    }
    xxh3_64(&buf)
}
