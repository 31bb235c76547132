//! Record and error sinks

pub mod error_log;
pub mod writer;

pub use error_log::ErrorLog;
pub use writer::{FileSink, SinkResult, SinkWriter};
