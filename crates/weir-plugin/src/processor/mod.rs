//! Built-in processor plugins

mod aggregate_count;
mod noop;
mod parse_json;
mod string_converter;

pub use aggregate_count::{AggregateCountFactory, AggregateCountProcessor};
pub use noop::{NoopFactory, NoopProcessor};
pub use parse_json::{ParseJsonFactory, ParseJsonProcessor};
pub use string_converter::{ConvertMode, StringConverterFactory, StringConverterProcessor};
