//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Sluice configuration file.

use crate::config::{load_config, SluiceConfig, StorageBackend};
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        match config.validate() {
            Ok(_) => {
                println!("✅ Configuration is valid");
                println!();
                print_summary(&config);
                Ok(0)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2)
            }
        }
    }
}

fn print_summary(config: &SluiceConfig) {
    println!("Configuration Summary:");
    println!("  Log Level: {}", config.application.log_level);
    println!("  Dry Run: {}", config.application.dry_run);
    println!("  Source Channel: {}", config.pipeline.source_channel);
    println!(
        "  Destination Relation: {}",
        config.pipeline.destination_relation
    );
    println!(
        "  Notification Channel: {}",
        config.pipeline.notification_channel
    );
    println!("  Error Log: {}", config.pipeline.error_log.display());
    println!("  Batch Size: {}", config.pipeline.batch_size);
    println!(
        "  Max Concurrent Files: {}",
        config.pipeline.max_concurrent_files
    );

    match config.storage.backend {
        StorageBackend::Folder => {
            println!("  Storage: folder");
            if let Some(root) = &config.storage.root {
                println!("  Storage Root: {}", root.display());
            }
        }
        StorageBackend::Http => {
            println!("  Storage: http");
            if let Some(base_url) = &config.storage.base_url {
                println!("  Storage URL: {base_url}");
            }
        }
    }

    println!("  PostgreSQL: {}", dsn_host(config));
    println!(
        "  Max Connections: {}",
        config.postgresql.max_connections
    );
    println!();
}

fn dsn_host(config: &SluiceConfig) -> &str {
    redact_dsn(config.postgresql.connection_string.expose_secret().as_ref())
}

/// Keep only the host part of a DSN
fn redact_dsn(dsn: &str) -> &str {
    match dsn.rsplit_once('@') {
        Some((_, host)) => host,
        None => "***",
    }
}
