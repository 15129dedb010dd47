//! Built-in source plugins

mod file;
mod stdin;

pub use file::{FileSource, FileSourceConfig, FileSourceFactory};
pub use stdin::{StdinSource, StdinSourceFactory};

use serde_json::Value;

use weir_model::{Event, Record};

/// Line decoding for text-based sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Each line is a JSON object
    #[default]
    Ndjson,

    /// Each line becomes the `message` field of a fresh event
    Plaintext,
}

impl Codec {
    /// Parse a codec name from config
    pub fn parse(name: &str) -> Result<Self, String> {
        match name {
            "ndjson" => Ok(Codec::Ndjson),
            "plaintext" => Ok(Codec::Plaintext),
            other => Err(format!(
                "unknown codec '{}', expected 'ndjson' or 'plaintext'",
                other
            )),
        }
    }

    /// Decode one line into a record.
    ///
    /// Returns `None` for lines the codec cannot represent (logged by
    /// the caller); blank lines are skipped silently.
    pub fn decode(&self, line: &str, event_type: &str) -> Option<Record> {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            return None;
        }

        let event = match self {
            Codec::Ndjson => match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(fields)) => Event::from_fields(fields),
                Ok(other) => {
                    // Non-object JSON still becomes a single-field event
                    let mut event = Event::new();
                    event.insert("message", other);
                    event
                }
                Err(_) => return None,
            },
            Codec::Plaintext => {
                let mut event = Event::new();
                event.insert("message", Value::String(line.to_string()));
                event
            }
        };

        Some(Record::new(event, event_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_parse() {
        assert_eq!(Codec::parse("ndjson").unwrap(), Codec::Ndjson);
        assert_eq!(Codec::parse("plaintext").unwrap(), Codec::Plaintext);
        assert!(Codec::parse("csv").is_err());
    }

    #[test]
    fn test_ndjson_decode() {
        let record = Codec::Ndjson.decode(r#"{"k": 1}"#, "event").unwrap();
        assert_eq!(record.event().get("k"), Some(&serde_json::json!(1)));
        assert_eq!(record.metadata().event_type, "event");
    }

    #[test]
    fn test_ndjson_non_object_wraps_message() {
        let record = Codec::Ndjson.decode("42", "event").unwrap();
        assert_eq!(record.event().get("message"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn test_ndjson_invalid_is_none() {
        assert!(Codec::Ndjson.decode("{not json", "event").is_none());
    }

    #[test]
    fn test_plaintext_decode() {
        let record = Codec::Plaintext.decode("hello world\r", "log").unwrap();
        assert_eq!(record.event().get_str("message"), Some("hello world"));
        assert_eq!(record.metadata().event_type, "log");
    }

    #[test]
    fn test_blank_lines_skipped() {
        assert!(Codec::Plaintext.decode("", "event").is_none());
        assert!(Codec::Ndjson.decode("", "event").is_none());
    }
}
