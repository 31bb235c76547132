//! Append-only error log
//!
//! One JSON [`ErrorRecord`] per line. The log is shared by every file in
//! flight; a line is written whole under the lock, so lines never
//! interleave. Timestamps never go backwards within one process, even if
//! the wall clock does.

use crate::domain::{DecodeFailure, ErrorRecord, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

struct LogState {
    file: File,
    last_stamp: Option<DateTime<Utc>>,
}

pub struct ErrorLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl ErrorLog {
    /// Open `path` for appending, creating it and its parent directories
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::debug!(path = %path.display(), "Error log opened");

        Ok(Self {
            path,
            state: Mutex::new(LogState {
                file,
                last_stamp: None,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp `failure` with the current time and append it
    pub async fn append(&self, failure: DecodeFailure) -> Result<ErrorRecord> {
        let mut state = self.state.lock().await;

        let now = Utc::now();
        let stamp = match state.last_stamp {
            Some(last) if last > now => last,
            _ => now,
        };
        state.last_stamp = Some(stamp);

        let record = ErrorRecord::stamp(failure, stamp);
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        state.file.write_all(&line).await?;
        state.file.flush().await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn read_records(path: &Path) -> Vec<ErrorRecord> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_creates_parent_dirs_and_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/errors.txt");

        let log = ErrorLog::open(&path).await.unwrap();
        log.append(DecodeFailure::new("drops/a.csv", "line 2: bad timestamp"))
            .await
            .unwrap();
        drop(log);

        // Reopening appends rather than truncating
        let log = ErrorLog::open(&path).await.unwrap();
        log.append(
            DecodeFailure::new("drops/b.zip", "invalid JSON")
                .with_entry("day1.json")
                .with_row(serde_json::json!({"user_id": "U1"})),
        )
        .await
        .unwrap();

        let records = read_records(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_id, "drops/a.csv");
        assert_eq!(records[1].entry.as_deref(), Some("day1.json"));
        assert!(records[1].timestamp.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("errors.txt");
        let log = Arc::new(ErrorLog::open(&path).await.unwrap());

        let mut tasks = tokio::task::JoinSet::new();
        for task in 0..8 {
            let log = Arc::clone(&log);
            tasks.spawn(async move {
                for row in 0..50 {
                    let failure = DecodeFailure::new(format!("drops/{task}.csv"), "x".repeat(200))
                        .with_row(serde_json::json!({ "row": row }));
                    log.append(failure).await.unwrap();
                }
            });
        }
        while tasks.join_next().await.is_some() {}

        let records = read_records(&path);
        assert_eq!(records.len(), 400);
    }

    #[tokio::test]
    async fn test_timestamps_are_monotonic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("errors.txt");
        let log = ErrorLog::open(&path).await.unwrap();

        for i in 0..100 {
            log.append(DecodeFailure::new("drops/a.csv", format!("line {i}")))
                .await
                .unwrap();
        }

        let stamps: Vec<DateTime<Utc>> = read_records(&path)
            .iter()
            .map(|r| {
                DateTime::parse_from_rfc3339(&r.timestamp)
                    .unwrap()
                    .with_timezone(&Utc)
            })
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }
}
