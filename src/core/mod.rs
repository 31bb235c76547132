//! Core business logic for Sluice.
//!
//! # Modules
//!
//! - [`routing`] - Content-type routing of arrival notifications
//! - [`decode`] - Streaming CSV and zipped-JSON decoders
//! - [`transform`] - Flattening of nested event payloads
//! - [`trigger`] - Republishing of lifecycle events
//! - [`sink`] - Batched warehouse writes and the error log
//! - [`pipeline`] - Per-file processing and the driver loop
//!
//! # File Workflow
//!
//! 1. **Route**: Pick a decoder from the declared content type, or skip
//! 2. **Fetch**: Read the file from the object store
//! 3. **Decode**: Emit records and failures one at a time, in source order
//! 4. **Trigger**: Publish lifecycle events to the notification channel
//! 5. **Sink**: Batch records into the warehouse, append failures to the error log
//! 6. **Settle**: Acknowledge the notification, or release it on fatal error
//!
//! # Example
//!
//! ```rust,no_run
//! use sluice::adapters::memory::{MemoryChannel, MemoryWarehouse};
//! use sluice::adapters::storage::FolderStore;
//! use sluice::core::pipeline::FileProcessor;
//! use sluice::core::sink::{ErrorLog, SinkWriter};
//! use sluice::core::trigger::TriggerPublisher;
//! use sluice::domain::ArrivalNotification;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let error_log = Arc::new(ErrorLog::open("/tmp/sluice/errors.txt").await?);
//! let sink = SinkWriter::new(Arc::new(MemoryWarehouse::new()), error_log, "events", 500, false);
//! let triggers = TriggerPublisher::new(Arc::new(MemoryChannel::new()), "trigger_events", false);
//! let processor = FileProcessor::new(
//!     Arc::new(FolderStore::new("/srv/drops")),
//!     Arc::new(sink),
//!     Arc::new(triggers),
//! );
//!
//! let summary = processor
//!     .process(&ArrivalNotification::new("text/csv", "drops/2024/events.csv"))
//!     .await?;
//! println!("Written: {}", summary.sink.written);
//! # Ok(())
//! # }
//! ```

pub mod decode;
pub mod pipeline;
pub mod routing;
pub mod sink;
pub mod transform;
pub mod trigger;
