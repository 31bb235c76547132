//! Warehouse and error-log sinks
//!
//! [`SinkWriter`] is shared by all files; [`FileSink`] is the per-file
//! handle that buffers records into warehouse batches.

use super::error_log::ErrorLog;
use crate::adapters::warehouse::Warehouse;
use crate::domain::{DecodeFailure, NormalizedEventRecord, Result};
use std::sync::Arc;

/// Counts of what one file's sink did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkResult {
    /// Rows the warehouse accepted
    pub written: usize,
    /// Rows the warehouse rejected
    pub rejected: usize,
    /// Error records appended to the error log
    pub quarantined: usize,
    /// Rows that would have been written in dry-run mode
    pub dry_run_rows: usize,
    /// Number of `insert_rows` calls made
    pub batches: usize,
    /// Warehouse rejection messages
    pub errors: Vec<String>,
}

impl SinkResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch's outcome
    pub fn add_batch(&mut self, submitted: usize, errors: Vec<String>) {
        self.batches += 1;
        self.written += submitted.saturating_sub(errors.len());
        self.rejected += errors.len();
        self.errors.extend(errors);
    }

    /// Add a quarantined failure
    pub fn add_quarantined(&mut self) {
        self.quarantined += 1;
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: SinkResult) {
        self.written += other.written;
        self.rejected += other.rejected;
        self.quarantined += other.quarantined;
        self.dry_run_rows += other.dry_run_rows;
        self.batches += other.batches;
        self.errors.extend(other.errors);
    }
}

/// Shared sink configuration and handles
pub struct SinkWriter {
    warehouse: Arc<dyn Warehouse>,
    error_log: Arc<ErrorLog>,
    relation: String,
    batch_size: usize,
    dry_run: bool,
}

impl SinkWriter {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        error_log: Arc<ErrorLog>,
        relation: impl Into<String>,
        batch_size: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            warehouse,
            error_log,
            relation: relation.into(),
            batch_size: batch_size.max(1),
            dry_run,
        }
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn error_log(&self) -> &Arc<ErrorLog> {
        &self.error_log
    }

    /// Start sinking one file
    pub fn for_file(&self, file_id: impl Into<String>) -> FileSink<'_> {
        FileSink {
            writer: self,
            file_id: file_id.into(),
            buffer: Vec::with_capacity(self.batch_size),
            result: SinkResult::new(),
        }
    }
}

/// Per-file sink
///
/// Records are buffered until a batch is full; call [`FileSink::finish`]
/// to flush the remainder. Dropping a `FileSink` discards buffered rows.
pub struct FileSink<'a> {
    writer: &'a SinkWriter,
    file_id: String,
    buffer: Vec<NormalizedEventRecord>,
    result: SinkResult,
}

impl FileSink<'_> {
    /// Buffer a record, flushing if the batch is full
    ///
    /// # Errors
    ///
    /// Returns `SluiceError::Warehouse` if the warehouse cannot be reached.
    pub async fn write_record(&mut self, record: NormalizedEventRecord) -> Result<()> {
        self.buffer.push(record);
        if self.buffer.len() >= self.writer.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Append a failure to the error log
    pub async fn write_failure(&mut self, failure: DecodeFailure) -> Result<()> {
        tracing::debug!(
            file_id = %failure.file_id,
            entry = ?failure.entry,
            error = %failure.error,
            "Quarantining input"
        );
        self.writer.error_log.append(failure).await?;
        self.result.add_quarantined();
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);

        if self.writer.dry_run {
            tracing::info!(
                count = batch.len(),
                relation = %self.writer.relation,
                file_id = %self.file_id,
                "DRY RUN: Would insert {} records",
                batch.len()
            );
            self.result.dry_run_rows += batch.len();
            return Ok(());
        }

        let row_errors = self
            .writer
            .warehouse
            .insert_rows(&self.writer.relation, &batch)
            .await?;

        for row_error in &row_errors {
            tracing::warn!(
                file_id = %self.file_id,
                relation = %self.writer.relation,
                index = row_error.index,
                user_id = %row_error.user_id,
                error = %row_error.error,
                "Warehouse rejected row"
            );
        }

        self.result.add_batch(
            batch.len(),
            row_errors.into_iter().map(|e| e.error).collect(),
        );
        Ok(())
    }

    /// Flush the trailing partial batch and return the file's counts
    pub async fn finish(mut self) -> Result<SinkResult> {
        self.flush().await?;
        Ok(self.result)
    }
}
