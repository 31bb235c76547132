//! Single-file processing
//!
//! Routes a notification, fetches the file, runs its decoder and fans the
//! outcomes out to the trigger publisher and the sinks. Outcomes are
//! handled in source order.

use super::summary::FileSummary;
use crate::adapters::storage::ObjectStore;
use crate::core::decode::{spawn_decoder, DecoderInput};
use crate::core::routing::{ContentRouter, FileKind, RoutedFile};
use crate::core::sink::SinkWriter;
use crate::core::trigger::{TriggerOutcome, TriggerPublisher};
use crate::domain::{ArrivalNotification, DecodeFailure, FileId, Result, SluiceError};
use crate::{log_file_complete, log_file_received};
use std::sync::Arc;
use std::time::Instant;

/// Outcomes buffered between a decoder and its consumer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub struct FileProcessor {
    router: ContentRouter,
    store: Arc<dyn ObjectStore>,
    sink: Arc<SinkWriter>,
    triggers: Arc<TriggerPublisher>,
    channel_capacity: usize,
}

impl FileProcessor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        sink: Arc<SinkWriter>,
        triggers: Arc<TriggerPublisher>,
    ) -> Self {
        Self {
            router: ContentRouter::new(),
            store,
            sink,
            triggers,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Set the decoder-to-sink buffer size
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Process the file a notification announces
    ///
    /// Failures local to a row, entry or file that retrying cannot fix are
    /// written to the error log and the file counts as processed.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that
    /// [`SluiceError::is_fatal_for_file`] classifies as fatal; the caller
    /// should leave the notification for redelivery.
    pub async fn process(&self, notification: &ArrivalNotification) -> Result<FileSummary> {
        let Some(routed) = self.router.route(notification) else {
            return Ok(FileSummary::skipped(&notification.file_id));
        };

        let start = Instant::now();
        log_file_received!(routed.file_id, routed.kind);

        let mut summary = FileSummary::new(&routed.file_id, routed.kind);

        let input = match self.fetch(&routed).await {
            Ok(input) => input,
            Err(e) if !e.is_fatal_for_file() => {
                tracing::warn!(file_id = %routed.file_id, error = %e, "Quarantining unreadable file");
                let mut sink = self.sink.for_file(&routed.file_id);
                sink.write_failure(DecodeFailure::new(&routed.file_id, e.to_string()))
                    .await?;
                summary.sink = sink.finish().await?;
                return Ok(summary.with_duration(start.elapsed()));
            }
            Err(e) => return Err(e),
        };

        let (mut outcomes, decoder) =
            spawn_decoder(routed.file_id.clone(), input, self.channel_capacity);
        let mut sink = self.sink.for_file(&routed.file_id);

        while let Some(outcome) = outcomes.recv().await {
            match outcome {
                Ok(record) => {
                    match self.triggers.check_and_publish(&record).await {
                        TriggerOutcome::Published(_) => summary.triggers_published += 1,
                        TriggerOutcome::Failed(_) => summary.triggers_failed += 1,
                        TriggerOutcome::Ignored | TriggerOutcome::Skipped => {}
                    }
                    sink.write_record(record).await?;
                }
                Err(failure) => sink.write_failure(failure).await?,
            }
        }

        decoder.await.map_err(|e| {
            SluiceError::Other(format!("Decoder for {} failed: {e}", routed.file_id))
        })?;

        summary.sink = sink.finish().await?;
        let summary = summary.with_duration(start.elapsed());

        log_file_complete!(
            summary.file_id,
            summary.sink.written,
            summary.sink.quarantined,
            summary.duration
        );

        Ok(summary)
    }

    async fn fetch(&self, routed: &RoutedFile) -> Result<DecoderInput> {
        let file_id = FileId::new(routed.file_id.as_str())?;
        match routed.kind {
            FileKind::Csv => Ok(DecoderInput::Text(self.store.read_text(&file_id).await?)),
            FileKind::Archive => Ok(DecoderInput::Blob(self.store.open_blob(&file_id).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryChannel, MemoryWarehouse};
    use crate::adapters::storage::FolderStore;
    use crate::core::sink::ErrorLog;
    use crate::domain::ErrorRecord;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        root: std::path::PathBuf,
        error_log: std::path::PathBuf,
        warehouse: MemoryWarehouse,
        channel: MemoryChannel,
        processor: FileProcessor,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("store");
        std::fs::create_dir_all(root.join("drops")).unwrap();
        let error_log = dir.path().join("errors.txt");

        let warehouse = MemoryWarehouse::new();
        let channel = MemoryChannel::new();
        let sink = SinkWriter::new(
            Arc::new(warehouse.clone()),
            Arc::new(ErrorLog::open(&error_log).await.unwrap()),
            "events",
            100,
            false,
        );
        let triggers = TriggerPublisher::new(Arc::new(channel.clone()), "trigger_events", false);
        let processor = FileProcessor::new(
            Arc::new(FolderStore::new(&root)),
            Arc::new(sink),
            Arc::new(triggers),
        )
        .with_channel_capacity(2);

        Fixture {
            _dir: dir,
            root,
            error_log,
            warehouse,
            channel,
            processor,
        }
    }

    fn error_records(path: &std::path::Path) -> Vec<ErrorRecord> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_csv_file_end_to_end() {
        let fx = fixture().await;
        std::fs::write(
            fx.root.join("drops/a.csv"),
            "user_id,Event_Name,event_datetime,proceeds_usd\n\
             U1,first_event,\"January 5, 2023, 3:00 PM\",9.99\n\
             U2,app_open,\"January 5, 2023, 3:05 PM\",\n\
             U3,app_open,yesterday,\n",
        )
        .unwrap();

        let summary = fx
            .processor
            .process(&ArrivalNotification::new("text/csv", "drops/a.csv"))
            .await
            .unwrap();

        assert_eq!(summary.kind, Some(FileKind::Csv));
        assert_eq!(summary.sink.written, 2);
        assert_eq!(summary.sink.quarantined, 1);
        assert_eq!(summary.triggers_published, 1);

        let rows = fx.warehouse.rows_in("events");
        assert_eq!(rows[0].user_id, "U1");
        assert_eq!(rows[0].event_datetime, 1_672_930_800);
        assert_eq!(rows[0].proceeds_usd.as_deref(), Some("9.99"));
        assert!(rows[0].event_parameters.is_none());

        assert_eq!(fx.channel.published().len(), 1);
        let errors = error_records(&fx.error_log);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file_id, "drops/a.csv");
    }

    #[tokio::test]
    async fn test_unrecognized_content_type_is_skipped() {
        let fx = fixture().await;

        let summary = fx
            .processor
            .process(&ArrivalNotification::new("application/json", "drops/a.json"))
            .await
            .unwrap();

        assert!(summary.is_skipped());
        assert!(fx.warehouse.calls().is_empty());
        assert!(error_records(&fx.error_log).is_empty());
    }

    #[tokio::test]
    async fn test_missing_object_is_quarantined() {
        let fx = fixture().await;

        let summary = fx
            .processor
            .process(&ArrivalNotification::new("text/csv", "drops/missing.csv"))
            .await
            .unwrap();

        assert_eq!(summary.sink.quarantined, 1);
        let errors = error_records(&fx.error_log);
        assert!(errors[0].error.contains("not found"));
    }

    #[tokio::test]
    async fn test_malformed_file_id_is_quarantined() {
        let fx = fixture().await;

        let summary = fx
            .processor
            .process(&ArrivalNotification::new("application/zip", "no-container"))
            .await
            .unwrap();

        assert_eq!(summary.sink.quarantined, 1);
    }

    #[tokio::test]
    async fn test_warehouse_outage_is_fatal() {
        let fx = fixture().await;
        std::fs::write(
            fx.root.join("drops/a.csv"),
            "user_id,Event_Name,event_datetime\nU1,app_open,\"January 5, 2023, 3:00 PM\"\n",
        )
        .unwrap();
        fx.warehouse.set_unavailable(true);

        let err = fx
            .processor
            .process(&ArrivalNotification::new("text/csv", "drops/a.csv"))
            .await
            .unwrap_err();
        assert!(err.is_fatal_for_file());
    }
}
