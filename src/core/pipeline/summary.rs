//! Per-file and per-run summaries

use crate::core::routing::FileKind;
use crate::core::sink::SinkResult;
use std::time::Duration;

/// Summary of one processed notification
#[derive(Debug, Clone, Default)]
pub struct FileSummary {
    /// Raw file id from the notification
    pub file_id: String,

    /// Decoder used; `None` when the notification was skipped
    pub kind: Option<FileKind>,

    /// Sink counts
    pub sink: SinkResult,

    /// Records announced on the notification channel
    pub triggers_published: usize,

    /// Trigger publishes that failed
    pub triggers_failed: usize,

    /// Wall time spent on the file
    pub duration: Duration,
}

impl FileSummary {
    pub fn new(file_id: impl Into<String>, kind: FileKind) -> Self {
        Self {
            file_id: file_id.into(),
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// A notification no decoder handles
    pub fn skipped(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            ..Self::default()
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.kind.is_none()
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Summary of a pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Notifications received from the source channel
    pub notifications_received: usize,

    /// Files decoded to completion
    pub files_processed: usize,

    /// Notifications with no matching decoder
    pub files_skipped: usize,

    /// Files aborted by a fatal error and left for redelivery
    pub files_failed: usize,

    /// Files still in flight when the drain deadline passed
    pub files_abandoned: usize,

    /// Accumulated sink counts
    pub sink: SinkResult,

    pub triggers_published: usize,
    pub triggers_failed: usize,

    /// Fatal error messages, one per failed file
    pub errors: Vec<String>,

    /// Duration of the run
    pub duration: Duration,

    /// Whether the run ended on a shutdown signal
    pub interrupted: bool,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Add a file that finished, processed or skipped
    pub fn add_file(&mut self, file: FileSummary) {
        if file.is_skipped() {
            self.files_skipped += 1;
            return;
        }
        self.files_processed += 1;
        self.triggers_published += file.triggers_published;
        self.triggers_failed += file.triggers_failed;
        self.sink.merge(file.sink);
    }

    /// Add a file aborted by a fatal error
    pub fn add_failure(&mut self, file_id: &str, error: String) {
        self.files_failed += 1;
        self.errors.push(format!("{file_id}: {error}"));
    }

    /// No fatal errors and no rejected rows
    pub fn is_successful(&self) -> bool {
        self.files_failed == 0 && self.files_abandoned == 0 && self.sink.rejected == 0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            notifications = self.notifications_received,
            processed = self.files_processed,
            skipped = self.files_skipped,
            failed = self.files_failed,
            abandoned = self.files_abandoned,
            written = self.sink.written,
            rejected = self.sink.rejected,
            quarantined = self.sink.quarantined,
            dry_run_rows = self.sink.dry_run_rows,
            triggers_published = self.triggers_published,
            triggers_failed = self.triggers_failed,
            duration_secs = self.duration.as_secs(),
            "Pipeline stopped"
        );

        if !self.errors.is_empty() {
            tracing::warn!(
                error_count = self.errors.len(),
                "Pipeline stopped with failed files"
            );
            for error in &self.errors {
                tracing::warn!(message = %error, "File failure");
            }
        }
    }
}
