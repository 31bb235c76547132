//! Pipeline orchestration

pub mod driver;
pub mod processor;
pub mod summary;

pub use driver::{DriverOptions, DriverState, PipelineDriver};
pub use processor::FileProcessor;
pub use summary::{FileSummary, RunSummary};
