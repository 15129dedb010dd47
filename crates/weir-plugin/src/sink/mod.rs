//! Built-in sink plugins

mod file;
mod null;
mod stdout;

pub use file::{FileSink, FileSinkConfig, FileSinkFactory};
pub use null::{NullSink, NullSinkFactory};
pub use stdout::{StdoutSink, StdoutSinkFactory};
