//! Ingest command implementation
//!
//! Processes one file through the same router, decoders and sinks as `run`,
//! without the inbound queue. Used for backfills and replays.

use super::{build_topology, load_validated};
use crate::core::pipeline::FileSummary;
use crate::domain::ArrivalNotification;
use clap::Args;

/// Arguments for the ingest command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Declared content type (text/csv or application/zip)
    #[arg(long)]
    pub content_type: String,

    /// File identifier as `<container>/<path>`
    #[arg(long)]
    pub file_id: String,

    /// Dry run mode - decode the file without writing rows or publishing triggers
    #[arg(long)]
    pub dry_run: bool,
}

impl IngestArgs {
    /// Execute the ingest command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(
            file_id = %self.file_id,
            content_type = %self.content_type,
            "Starting ingest command"
        );

        let config = match load_validated(config_path, self.dry_run) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        if config.application.dry_run {
            println!("🔍 DRY RUN MODE - No rows will be written and no triggers published");
            println!();
        }

        let topology = match build_topology(&config).await {
            Ok(t) => t,
            Err(code) => return Ok(code),
        };

        let notification = ArrivalNotification::new(&self.content_type, &self.file_id);
        println!("🚀 Ingesting {}...", self.file_id);

        let summary = match topology.processor.process(&notification).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(file_id = %self.file_id, error = %e, "Ingest failed");
                eprintln!("Ingest failed: {e}");
                return Ok(5);
            }
        };

        Ok(report(&summary))
    }
}

fn report(summary: &FileSummary) -> i32 {
    if summary.is_skipped() {
        println!("⚠️  Content type is not routed to a decoder; nothing ingested");
        return 0;
    }

    println!();
    println!("📊 Ingest Summary:");
    println!("  File: {}", summary.file_id);
    if let Some(kind) = summary.kind {
        println!("  Kind: {kind:?}");
    }
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

    if summary.sink.rejected > 0 {
        println!("⚠️  Ingest completed with rejected rows");
        1
    } else {
        println!("✅ Ingest completed successfully!");
        0
    }
}
