//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod ingest;
pub mod init;
pub mod run;
pub mod validate;

use crate::adapters::channel::NotificationSource;
use crate::adapters::factory::{create_object_store, create_postgres_adapters, prepare};
use crate::config::{load_config, SluiceConfig};
use crate::core::pipeline::FileProcessor;
use crate::core::sink::{ErrorLog, SinkWriter};
use crate::core::trigger::TriggerPublisher;
use std::sync::Arc;

/// Everything a command needs to process files
pub(crate) struct Topology {
    pub source: Arc<dyn NotificationSource>,
    pub processor: Arc<FileProcessor>,
}

/// Load, apply the dry-run flag, and validate
///
/// Prints the failure and returns the exit code on error.
pub(crate) fn load_validated(config_path: &str, dry_run: bool) -> Result<SluiceConfig, i32> {
    let mut config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            eprintln!("Failed to load configuration: {e}");
            return Err(2);
        }
    };

    if dry_run {
        tracing::info!("Enabling dry-run mode from CLI");
        config.application.dry_run = true;
    }

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Configuration validation failed");
        eprintln!("Configuration validation failed: {e}");
        return Err(2);
    }

    Ok(config)
}

/// Connect the adapters and assemble the per-file topology
///
/// Prints the failure and returns the exit code on error.
pub(crate) async fn build_topology(config: &SluiceConfig) -> Result<Topology, i32> {
    let dry_run = config.application.dry_run;

    let store = match create_object_store(&config.storage) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid storage configuration: {e}");
            return Err(2);
        }
    };

    let adapters = match create_postgres_adapters(config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Invalid PostgreSQL configuration: {e}");
            return Err(2);
        }
    };

    if let Err(e) = prepare(&adapters.client, config).await {
        tracing::error!(error = %e, "Failed to prepare PostgreSQL");
        eprintln!("Failed to connect to PostgreSQL: {e}");
        return Err(4);
    }

    let error_log = match ErrorLog::open(&config.pipeline.error_log).await {
        Ok(log) => Arc::new(log),
        Err(e) => {
            eprintln!("Failed to open error log: {e}");
            return Err(5);
        }
    };

    let sink = SinkWriter::new(
        adapters.warehouse,
        error_log,
        config.pipeline.destination_relation.clone(),
        config.pipeline.batch_size,
        dry_run,
    );
    let triggers = TriggerPublisher::new(
        adapters.publisher,
        config.pipeline.notification_channel.clone(),
        dry_run,
    );

    Ok(Topology {
        source: adapters.source,
        processor: Arc::new(FileProcessor::new(store, Arc::new(sink), Arc::new(triggers))),
    })
}
