//! Run command implementation
//!
//! This module implements the `run` command, which consumes file-arrival
//! notifications from the source channel until a shutdown signal.

use super::{build_topology, load_validated};
use crate::core::pipeline::{DriverOptions, PipelineDriver, RunSummary};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Dry run mode - decode files without writing rows or publishing triggers
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let config = match load_validated(config_path, self.dry_run) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        if config.application.dry_run {
            tracing::info!("Dry run mode enabled - no data will be written");
            println!("🔍 DRY RUN MODE - No rows will be written and no triggers published");
            println!();
        }

        let topology = match build_topology(&config).await {
            Ok(t) => t,
            Err(code) => return Ok(code),
        };

        let driver = PipelineDriver::new(
            topology.source,
            topology.processor,
            DriverOptions::from_config(&config.pipeline, config.application.dry_run),
        );

        println!(
            "🚀 Listening on '{}' (press Ctrl+C to stop)...",
            config.pipeline.source_channel
        );
        println!();

        let summary = match driver.run(shutdown_signal).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Pipeline failed");
                eprintln!("Pipeline failed: {e}");
                return Ok(5);
            }
        };

        print_summary(&summary);
        Ok(exit_code(&summary))
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("📊 Run Summary:");
    println!("  Notifications: {}", summary.notifications_received);
    println!("  Files Processed: {}", summary.files_processed);
    println!("  Files Skipped: {}", summary.files_skipped);
    println!("  Files Failed: {}", summary.files_failed);
    println!("  Files Abandoned: {}", summary.files_abandoned);
    println!("  Rows Written: {}", summary.sink.written);
    println!("  Rows Rejected: {}", summary.sink.rejected);
    println!("  Quarantined: {}", summary.sink.quarantined);
    if summary.sink.dry_run_rows > 0 {
        println!("  Rows (dry run): {}", summary.sink.dry_run_rows);
    }
    println!(
        "  Triggers: {} published, {} failed",
        summary.triggers_published, summary.triggers_failed
    );
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    if !summary.errors.is_empty() {
        println!("⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("  - {error}");
        }
        println!();
    }
}

/// Exit code for a finished run
///
/// A streaming run always ends on a shutdown signal, so a clean stop is a
/// success. 130 is reserved for a stop that cut files off mid-way.
fn exit_code(summary: &RunSummary) -> i32 {
    if summary.files_abandoned > 0 {
        println!("⚠️  Stopped before in-flight files finished; they will be redelivered.");
        tracing::info!(
            abandoned = summary.files_abandoned,
            "Run interrupted with files in flight"
        );
        130
    } else if summary.is_successful() {
        println!("✅ Pipeline stopped cleanly");
        0
    } else {
        println!("⚠️  Pipeline stopped with failures");
        1
    }
}
