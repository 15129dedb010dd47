//! Built-in buffer plugins

mod bounded;

pub use bounded::{BoundedBuffer, BoundedBufferConfig, BoundedBufferFactory};
