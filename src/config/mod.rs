//! Configuration management for Sluice.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Sluice uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SLUICE_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation before anything connects
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sluice::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sluice.toml")?;
//!
//! println!("Reading drops from: {}", config.pipeline.source_channel);
//! println!("Writing events to: {}", config.pipeline.destination_relation);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run switch
//! - [`PipelineConfig`] - Channels, relation, error log and tuning
//! - [`StorageConfig`] - Object store backend
//! - [`PostgreSQLConfig`] - Warehouse and queue connection
//! - [`LoggingConfig`] - Local JSON log files
//!
//! # Example Configuration
//!
//! ```toml
//! [pipeline]
//! source_channel = "file_drops"
//! destination_relation = "events"
//! notification_channel = "trigger_events"
//! error_log = "/var/lib/sluice/errors.txt"
//!
//! [storage]
//! backend = "folder"
//! root = "/srv/drops"
//!
//! [postgresql]
//! connection_string = "${SLUICE_PG_CONNECTION_STRING}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, LoggingConfig, PipelineConfig, PostgreSQLConfig, SluiceConfig,
    StorageBackend, StorageConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
