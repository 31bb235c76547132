// Sluice - Event-log ingestion pipeline
// Copyright (c) 2025 Sluice Contributors
// Licensed under the MIT License

//! # Sluice - Event-log ingestion pipeline
//!
//! Sluice consumes file-arrival notifications, fetches each announced file
//! from an object store, decodes it into normalized event records and writes
//! them to a PostgreSQL relation in batches.
//!
//! ## Overview
//!
//! - **CSV** exports (`text/csv`) are read row by row; timestamps such as
//!   `January 5, 2023, 3:00 PM` are parsed as UTC.
//! - **Zipped JSON** archives (`application/zip`) are streamed entry by entry
//!   and element by element, with nested event parameters flattened.
//! - Lifecycle events (`first_event`, `subscription_started`, ...) are republished
//!   to a notification channel for downstream consumers.
//! - Rows that cannot be decoded go to an append-only error log, one JSON
//!   line each; the rest of the file carries on.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Routing, decoding, flattening, triggers, sinks and the driver
//! - [`adapters`] - Object stores, PostgreSQL warehouse and queue, in-memory doubles
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sluice::adapters::factory::{create_object_store, create_postgres_adapters, prepare};
//! use sluice::config::load_config;
//! use sluice::core::pipeline::{DriverOptions, FileProcessor, PipelineDriver};
//! use sluice::core::sink::{ErrorLog, SinkWriter};
//! use sluice::core::trigger::TriggerPublisher;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("sluice.toml")?;
//!     let pipeline = &config.pipeline;
//!
//!     let adapters = create_postgres_adapters(&config)?;
//!     prepare(&adapters.client, &config).await?;
//!
//!     let error_log = Arc::new(ErrorLog::open(&pipeline.error_log).await?);
//!     let sink = SinkWriter::new(
//!         adapters.warehouse,
//!         error_log,
//!         pipeline.destination_relation.clone(),
//!         pipeline.batch_size,
//!         false,
//!     );
//!     let triggers =
//!         TriggerPublisher::new(adapters.publisher, pipeline.notification_channel.clone(), false);
//!     let processor = FileProcessor::new(
//!         create_object_store(&config.storage)?,
//!         Arc::new(sink),
//!         Arc::new(triggers),
//!     );
//!
//!     let driver = PipelineDriver::new(
//!         adapters.source,
//!         Arc::new(processor),
//!         DriverOptions::from_config(pipeline, false),
//!     );
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!     let summary = driver.run(shutdown_rx).await?;
//!     println!("Written: {}", summary.sink.written);
//!     Ok(())
//! }
//! ```
//!
//! ## Delivery Semantics
//!
//! Processing is at-least-once. A notification is acknowledged once its file
//! has been decoded and written, and released for redelivery when the object
//! store or the warehouse is unreachable. Both sinks are append-only, so a
//! redelivered file produces duplicate rows rather than lost ones.
//!
//! ## Error Handling
//!
//! All fallible library operations return [`domain::Result`], whose error is
//! [`domain::SluiceError`]:
//!
//! ```rust
//! use sluice::domain::{FileId, SluiceError, StorageError};
//!
//! let err = SluiceError::from(FileId::new("no-container").unwrap_err());
//! assert!(matches!(err, SluiceError::Storage(StorageError::InvalidFileId(_))));
//! assert!(!err.is_fatal_for_file());
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
