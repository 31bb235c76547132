//! Pipeline driver
//!
//! Polls the source channel and runs one task per received notification,
//! bounded by a semaphore. Each delivery is acknowledged once its file is
//! processed and negatively acknowledged when processing hits a fatal
//! error, so the channel hands the file out again (at-least-once) after a
//! backoff that grows with the delivery attempt.
//!
//! On shutdown the driver stops receiving, gives in-flight files until the
//! drain deadline, then aborts the rest and releases their deliveries.

use super::processor::FileProcessor;
use super::summary::{FileSummary, RunSummary};
use crate::adapters::channel::{Delivery, NotificationSource, RetryPolicy};
use crate::config::PipelineConfig;
use crate::domain::notification::FILE_ID_ATTRIBUTE;
use crate::domain::{ArrivalNotification, Result, SluiceError};
use crate::log_delivery_settled;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};

/// Observable driver lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Constructed, not yet running
    Idle,
    /// Receiving and processing notifications
    Listening,
    /// Shutdown requested; waiting for in-flight files
    Draining,
    /// Run finished
    Stopped,
}

/// Driver tuning
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub max_concurrent_files: usize,
    pub poll_interval: Duration,
    pub shutdown_timeout: Duration,
    /// Leave processed deliveries leased instead of acknowledging them
    pub dry_run: bool,
    /// Redelivery delay for files that failed
    pub retry: RetryPolicy,
}

impl DriverOptions {
    pub fn from_config(config: &PipelineConfig, dry_run: bool) -> Self {
        Self {
            max_concurrent_files: config.max_concurrent_files,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
            dry_run,
            retry: RetryPolicy::new(
                2,
                Duration::from_secs(config.retry_initial_secs),
                Some(Duration::from_secs(config.retry_max_secs)),
            ),
        }
    }
}

type TaskOutput = (String, Result<FileSummary>);

pub struct PipelineDriver {
    source: Arc<dyn NotificationSource>,
    processor: Arc<FileProcessor>,
    options: DriverOptions,
    state: watch::Sender<DriverState>,
}

impl PipelineDriver {
    pub fn new(
        source: Arc<dyn NotificationSource>,
        processor: Arc<FileProcessor>,
        options: DriverOptions,
    ) -> Self {
        let (state, _) = watch::channel(DriverState::Idle);
        Self {
            source,
            processor,
            options,
            state,
        }
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<DriverState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> DriverState {
        *self.state.borrow()
    }

    fn set_state(&self, state: DriverState) {
        tracing::debug!(state = ?state, "Driver state changed");
        self.state.send_replace(state);
    }

    /// Run until `shutdown` turns true or its sender is dropped
    ///
    /// # Errors
    ///
    /// Returns an error only if the driver itself cannot continue; file and
    /// channel failures are logged and counted in the summary.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<RunSummary> {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_files.max(1)));
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut in_flight: HashMap<String, Delivery> = HashMap::new();
        let mut summary = RunSummary::new();
        // Set while the channel is empty; settling continues in the meantime
        let mut idle_until: Option<tokio::time::Instant> = None;

        self.set_state(DriverState::Listening);
        tracing::info!(
            max_concurrent_files = self.options.max_concurrent_files,
            dry_run = self.options.dry_run,
            "Pipeline listening"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    self.settle(joined, &mut in_flight, &mut summary).await;
                }

                _ = tokio::time::sleep_until(
                    idle_until.unwrap_or_else(tokio::time::Instant::now)
                ), if idle_until.is_some() => {
                    idle_until = None;
                }

                permit = Arc::clone(&semaphore).acquire_owned(), if idle_until.is_none() => {
                    let permit = permit.map_err(|e| {
                        SluiceError::Other(format!("File permit pool closed: {e}"))
                    })?;

                    match self.source.receive().await {
                        Ok(Some(delivery)) if in_flight.contains_key(&delivery.id) => {
                            drop(permit);
                            tracing::warn!(
                                delivery_id = %delivery.id,
                                attempt = delivery.attempt,
                                "Delivery is already in flight, ignoring duplicate"
                            );
                        }
                        Ok(Some(delivery)) => {
                            summary.notifications_received += 1;
                            in_flight.insert(delivery.id.clone(), delivery.clone());

                            let processor = Arc::clone(&self.processor);
                            tasks.spawn(async move {
                                let _permit = permit;
                                let notification =
                                    ArrivalNotification::from_attributes(&delivery.attributes);
                                let result = match notification {
                                    Some(notification) => processor.process(&notification).await,
                                    None => {
                                        tracing::debug!(
                                            delivery_id = %delivery.id,
                                            "Delivery is not a file notification, skipping"
                                        );
                                        Ok(FileSummary::skipped(delivery.id.clone()))
                                    }
                                };
                                (delivery.id, result)
                            });
                        }
                        Ok(None) => {
                            drop(permit);
                            idle_until = Some(self.next_poll());
                        }
                        Err(e) => {
                            drop(permit);
                            tracing::warn!(error = %e, "Failed to receive notification");
                            idle_until = Some(self.next_poll());
                        }
                    }
                }
            }
        }

        summary.interrupted = true;
        self.drain(&mut tasks, &mut in_flight, &mut summary).await;

        self.set_state(DriverState::Stopped);
        let summary = summary.with_duration(start.elapsed());
        summary.log_summary();
        Ok(summary)
    }

    fn next_poll(&self) -> tokio::time::Instant {
        tokio::time::Instant::now() + self.options.poll_interval
    }

    async fn drain(
        &self,
        tasks: &mut JoinSet<TaskOutput>,
        in_flight: &mut HashMap<String, Delivery>,
        summary: &mut RunSummary,
    ) {
        self.set_state(DriverState::Draining);
        tracing::info!(
            in_flight = tasks.len(),
            timeout_secs = self.options.shutdown_timeout.as_secs(),
            "Draining in-flight files"
        );

        let drained = tokio::time::timeout(self.options.shutdown_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                self.settle(joined, in_flight, summary).await;
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = tasks.len(),
                "Drain deadline passed, abandoning in-flight files"
            );
            tasks.abort_all();
            while let Some(joined) = tasks.join_next().await {
                if !matches!(&joined, Err(e) if e.is_cancelled()) {
                    self.settle(joined, in_flight, summary).await;
                }
            }
        }

        // Aborted and panicked tasks never reported back. They did not fail,
        // so they are released for immediate redelivery.
        for (_, delivery) in in_flight.drain() {
            summary.files_abandoned += 1;
            self.release(&delivery, Duration::ZERO).await;
        }
    }

    async fn settle(
        &self,
        joined: std::result::Result<TaskOutput, JoinError>,
        in_flight: &mut HashMap<String, Delivery>,
        summary: &mut RunSummary,
    ) {
        let (delivery_id, result) = match joined {
            Ok(output) => output,
            Err(e) => {
                // The delivery stays in `in_flight` and is released at shutdown
                tracing::error!(error = %e, "File task failed");
                return;
            }
        };

        let Some(delivery) = in_flight.remove(&delivery_id) else {
            return;
        };

        match result {
            Ok(file) => {
                summary.add_file(file);
                if self.options.dry_run {
                    // Left leased; the channel shows it again once the lease lapses
                    log_delivery_settled!(delivery.id, delivery.attempt, "hold");
                } else {
                    self.acknowledge(&delivery).await;
                }
            }
            Err(e) => {
                let file_id = delivery
                    .attributes
                    .get(FILE_ID_ATTRIBUTE)
                    .map(String::as_str)
                    .unwrap_or("<unknown>");
                tracing::error!(
                    file_id = %file_id,
                    delivery_id = %delivery.id,
                    attempt = delivery.attempt,
                    error = %e,
                    "File processing failed, releasing for redelivery"
                );
                summary.add_failure(file_id, e.to_string());
                let retry_after = self.options.retry.time_until_next_retry(delivery.attempt);
                self.release(&delivery, retry_after).await;
            }
        }
    }

    async fn acknowledge(&self, delivery: &Delivery) {
        match self.source.ack(delivery).await {
            Ok(()) => log_delivery_settled!(delivery.id, delivery.attempt, "ack"),
            Err(e) => tracing::warn!(
                delivery_id = %delivery.id,
                error = %e,
                "Failed to acknowledge delivery"
            ),
        }
    }

    async fn release(&self, delivery: &Delivery, retry_after: Duration) {
        match self.source.nack(delivery, retry_after).await {
            Ok(()) => {
                log_delivery_settled!(delivery.id, delivery.attempt, "nack");
                tracing::debug!(
                    delivery_id = %delivery.id,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Delivery released"
                );
            }
            Err(e) => tracing::warn!(
                delivery_id = %delivery.id,
                error = %e,
                "Failed to release delivery"
            ),
        }
    }
}
