//! End-to-end tests of the pipeline over in-memory adapters
//!
//! These tests verify that:
//! - CSV and zipped-JSON files reach the warehouse through the driver
//! - Undecodable rows and entries land in the error log, not the warehouse
//! - Trigger events are republished and publish failures stay local
//! - Dry runs write nothing and leave deliveries leased

use sluice::adapters::channel::RetryPolicy;
use sluice::adapters::memory::{MemoryChannel, MemoryWarehouse};
use sluice::adapters::storage::FolderStore;
use sluice::core::pipeline::{DriverOptions, FileProcessor, PipelineDriver, RunSummary};
use sluice::core::sink::{ErrorLog, SinkWriter};
use sluice::core::trigger::TriggerPublisher;
use sluice::domain::{ArrivalNotification, ErrorRecord, NormalizedEventRecord};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

struct Harness {
    _dir: TempDir,
    root: PathBuf,
    error_log: PathBuf,
    inbound: MemoryChannel,
    triggers: MemoryChannel,
    warehouse: MemoryWarehouse,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("store");
        std::fs::create_dir_all(root.join("drops")).unwrap();
        let error_log = dir.path().join("logs/errors.txt");
        Self {
            _dir: dir,
            root,
            error_log,
            inbound: MemoryChannel::new(),
            triggers: MemoryChannel::new(),
            warehouse: MemoryWarehouse::new(),
        }
    }

    fn drop_file(&self, path: &str, contents: &[u8]) {
        let full = self.root.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, contents).unwrap();
    }

    async fn driver(&self, batch_size: usize, dry_run: bool) -> PipelineDriver {
        let sink = SinkWriter::new(
            Arc::new(self.warehouse.clone()),
            Arc::new(ErrorLog::open(&self.error_log).await.unwrap()),
            "analytics.events",
            batch_size,
            dry_run,
        );
        let triggers =
            TriggerPublisher::new(Arc::new(self.triggers.clone()), "trigger_events", dry_run);
        let processor = FileProcessor::new(
            Arc::new(FolderStore::new(&self.root)),
            Arc::new(sink),
            Arc::new(triggers),
        );

        PipelineDriver::new(
            Arc::new(self.inbound.clone()),
            Arc::new(processor),
            DriverOptions {
                max_concurrent_files: 4,
                poll_interval: Duration::from_millis(10),
                shutdown_timeout: Duration::from_secs(5),
                dry_run,
                retry: RetryPolicy::default(),
            },
        )
    }

    fn error_records(&self) -> Vec<ErrorRecord> {
        std::fs::read_to_string(&self.error_log)
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Run the driver until `done` holds, then shut it down
async fn run_until(
    driver: PipelineDriver,
    mut done: impl FnMut() -> bool,
) -> RunSummary {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn(async move { driver.run(shutdown_rx).await });

    for _ in 0..500 {
        if done() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(done(), "pipeline did not reach the expected state");

    shutdown_tx.send(true).unwrap();
    run.await.unwrap().unwrap()
}

fn sorted_users(rows: &[NormalizedEventRecord]) -> Vec<String> {
    let mut users: Vec<_> = rows.iter().map(|r| r.user_id.clone()).collect();
    users.sort();
    users
}

const CSV: &str = "user_id,Event_Name,event_datetime,city,country,proceeds_usd\n\
                   U1,first_event,\"January 5, 2023, 3:00 PM\",Lisbon,PT,9.99\n\
                   U2,app_open,\"January 5, 2023, 3:05 PM\",Porto,PT,\n\
                   U3,app_open,not a date,Faro,PT,\n\
                   U4,subscription_cancelled,\"February 1, 2023, 9:30 AM\",,,\n";

#[tokio::test]
async fn test_mixed_files_reach_warehouse() {
    let h = Harness::new();
    h.drop_file("drops/2023/export.csv", CSV.as_bytes());
    h.drop_file(
        "drops/2023/batch.zip",
        &build_zip(&[
            (
                "part-0.json",
                r#"[{"user_id":"A1","event_name":"subscription_started","event_timestamp":1700000000,
                     "params":{"plan":"pro","seats":[1,2]}},
                    {"user_id":"A2","event_name":"app_open","event_timestamp":1700000001}]"#,
            ),
            ("part-1.json", r#"[{"user_id":"A9","#),
        ]),
    );

    h.inbound
        .push(&ArrivalNotification::new("text/csv", "drops/2023/export.csv"));
    h.inbound
        .push(&ArrivalNotification::new("application/zip", "drops/2023/batch.zip"));
    h.inbound
        .push(&ArrivalNotification::new("image/png", "drops/2023/logo.png"));

    let driver = h.driver(500, false).await;
    let inbound = h.inbound.clone();
    let summary = run_until(driver, || inbound.acked().len() == 3).await;

    assert_eq!(summary.notifications_received, 3);
    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.files_failed, 0);
    assert_eq!(summary.sink.written, 5);
    assert_eq!(summary.sink.quarantined, 2);
    assert!(summary.is_successful());

    let rows = h.warehouse.rows_in("analytics.events");
    assert_eq!(sorted_users(&rows), vec!["A1", "A2", "U1", "U2", "U4"]);

    let u1 = rows.iter().find(|r| r.user_id == "U1").unwrap();
    assert_eq!(u1.event_datetime, 1_672_930_800);
    assert_eq!(u1.city.as_deref(), Some("Lisbon"));
    assert_eq!(u1.proceeds_usd.as_deref(), Some("9.99"));
    assert!(u1.event_parameters.is_none());

    let a1 = rows.iter().find(|r| r.user_id == "A1").unwrap();
    let params = a1.event_parameters.as_ref().unwrap();
    assert_eq!(params["params_plan"], "pro");
    assert_eq!(params["params_seats_1"], 2);

    let mut errors = h.error_records();
    errors.sort_by(|a, b| a.file_id.cmp(&b.file_id));
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].file_id, "drops/2023/batch.zip");
    assert_eq!(errors[0].entry.as_deref(), Some("part-1.json"));
    assert_eq!(errors[1].file_id, "drops/2023/export.csv");

    let published: Vec<String> = h
        .triggers
        .published()
        .iter()
        .map(|(_, bytes)| {
            serde_json::from_slice::<NormalizedEventRecord>(bytes)
                .unwrap()
                .event_name
        })
        .collect();
    assert_eq!(published.len(), 3);
    assert!(published.contains(&"first_event".to_string()));
    assert!(published.contains(&"subscription_started".to_string()));
    assert!(published.contains(&"subscription_cancelled".to_string()));
}

#[tokio::test]
async fn test_batches_respect_batch_size() {
    let h = Harness::new();
    let mut csv = String::from("user_id,Event_Name,event_datetime\n");
    for i in 0..7 {
        csv.push_str(&format!("U{i},app_open,\"March 3, 2023, 10:0{i} AM\"\n"));
    }
    h.drop_file("drops/many.csv", csv.as_bytes());
    h.inbound
        .push(&ArrivalNotification::new("text/csv", "drops/many.csv"));

    let driver = h.driver(3, false).await;
    let inbound = h.inbound.clone();
    let summary = run_until(driver, || inbound.acked().len() == 1).await;

    assert_eq!(summary.sink.written, 7);
    assert_eq!(h.warehouse.calls(), vec![3, 3, 1]);
}

#[tokio::test]
async fn test_rejected_rows_do_not_discard_batch() {
    let mut h = Harness::new();
    h.warehouse = MemoryWarehouse::with_rejection(|record| {
        (record.user_id == "U2").then(|| "duplicate key value".to_string())
    });
    h.drop_file("drops/export.csv", CSV.as_bytes());
    h.inbound
        .push(&ArrivalNotification::new("text/csv", "drops/export.csv"));

    let driver = h.driver(500, false).await;
    let inbound = h.inbound.clone();
    let summary = run_until(driver, || inbound.acked().len() == 1).await;

    assert_eq!(summary.sink.written, 2);
    assert_eq!(summary.sink.rejected, 1);
    assert!(!summary.is_successful());
    assert_eq!(sorted_users(&h.warehouse.rows()), vec!["U1", "U4"]);
}

#[tokio::test]
async fn test_trigger_publish_failure_keeps_rows() {
    let h = Harness::new();
    h.triggers.fail_publish(true);
    h.drop_file("drops/export.csv", CSV.as_bytes());
    h.inbound
        .push(&ArrivalNotification::new("text/csv", "drops/export.csv"));

    let driver = h.driver(500, false).await;
    let inbound = h.inbound.clone();
    let summary = run_until(driver, || inbound.acked().len() == 1).await;

    assert_eq!(summary.triggers_published, 0);
    assert_eq!(summary.triggers_failed, 2);
    assert_eq!(summary.sink.written, 3);
    assert!(h.triggers.published().is_empty());
}

#[tokio::test]
async fn test_dry_run_writes_nothing_and_holds_deliveries() {
    let h = Harness::new();
    h.drop_file("drops/export.csv", CSV.as_bytes());
    h.inbound
        .push(&ArrivalNotification::new("text/csv", "drops/export.csv"));

    let driver = h.driver(500, true).await;
    let state = driver.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn(async move { driver.run(shutdown_rx).await });

    // The error log is written even in dry runs, so it marks completion
    let error_log = h.error_log.clone();
    for _ in 0..500 {
        if error_lines(&error_log) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();
    let summary = run.await.unwrap().unwrap();

    assert_eq!(summary.sink.dry_run_rows, 3);
    assert_eq!(summary.sink.written, 0);
    assert!(h.warehouse.calls().is_empty());
    assert!(h.triggers.published().is_empty());
    assert!(h.inbound.acked().is_empty());
    assert!(h.inbound.nacked().is_empty());
    assert_eq!(h.inbound.leased(), 1);
    assert_eq!(
        *state.borrow(),
        sluice::core::pipeline::DriverState::Stopped
    );
}

fn error_lines(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_redelivered_file_is_written_again() {
    let h = Harness::new();
    h.drop_file("drops/export.csv", CSV.as_bytes());
    h.inbound
        .push(&ArrivalNotification::new("text/csv", "drops/export.csv"));
    h.inbound
        .push(&ArrivalNotification::new("text/csv", "drops/export.csv"));

    let driver = h.driver(500, false).await;
    let inbound = h.inbound.clone();
    let summary = run_until(driver, || inbound.acked().len() == 2).await;

    assert_eq!(summary.files_processed, 2);
    assert_eq!(h.warehouse.rows().len(), 6);
    assert_eq!(h.error_records().len(), 2);
}
