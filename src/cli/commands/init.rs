//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "sluice.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Sluice configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        match fs::write(&self.output, Self::generate_config()) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Set SLUICE_PG_CONNECTION_STRING in your environment or .env file");
                println!("  3. Validate configuration: sluice validate-config");
                println!("  4. Start the pipeline: sluice run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate a starter configuration with comments
    pub(crate) fn generate_config() -> String {
        r#"# Sluice Configuration File
# Event-log ingestion pipeline
#
# Every key can be overridden with SLUICE_<SECTION>_<KEY>,
# e.g. SLUICE_PIPELINE_BATCH_SIZE=1000.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Dry run mode (decode files, write nothing, publish nothing)
dry_run = false

# ============================================================================
# Pipeline
# ============================================================================
[pipeline]
# Queue table carrying file-arrival notifications
source_channel = "file_drops"

# Relation receiving decoded event rows
destination_relation = "events"

# Queue table receiving lifecycle trigger events
notification_channel = "trigger_events"

# Append-only file holding one JSON line per decode failure
error_log = "/var/lib/sluice/errors.txt"

# Rows per warehouse insert (1-10000)
batch_size = 500

# Files processed at once (1-256)
max_concurrent_files = 8

# Seconds in-flight files get to finish after a shutdown signal
shutdown_timeout_secs = 30

# Wait between polls of an empty source channel
poll_interval_ms = 1000

# Seconds a received notification stays invisible to other consumers
lease_seconds = 300

# Seconds before a failed file is redelivered; doubles per failure up to the max
retry_initial_secs = 5
retry_max_secs = 300

# ============================================================================
# Object Store
# ============================================================================
[storage]
# folder | http
backend = "folder"

# Folder backend: files live at <root>/<container>/<path>
root = "/srv/drops"

# HTTP backend: files are fetched from <base_url>/<container>/<path>
# base_url = "https://objects.example.com"

timeout_seconds = 60

# ============================================================================
# PostgreSQL (warehouse and queues)
# ============================================================================
[postgresql]
# Connection string format: postgresql://[user[:password]@][host][:port][/dbname][?params]
connection_string = "${SLUICE_PG_CONNECTION_STRING}"

max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60

# SSL/TLS mode: disable | allow | prefer | require | verify-ca | verify-full
ssl_mode = "prefer"

# ============================================================================
# Logging
# ============================================================================
[logging]
# Write a JSON copy of the logs to rolling files
local_enabled = false
local_path = "/var/log/sluice"

# daily | hourly
local_rotation = "daily"
"#
        .to_string()
    }
}
