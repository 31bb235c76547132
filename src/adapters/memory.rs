//! In-process channel and warehouse
//!
//! Test doubles for the notification channel and the warehouse. Both types
//! are cheap to clone and clones share state.

use crate::adapters::channel::{Delivery, NotificationPublisher, NotificationSource};
use crate::adapters::warehouse::{RowError, Warehouse};
use crate::domain::{ArrivalNotification, NormalizedEventRecord, Result, SluiceError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct ChannelState {
    pending: VecDeque<Delivery>,
    delayed: Vec<(Instant, Delivery)>,
    leased: HashMap<String, Delivery>,
    acked: Vec<Delivery>,
    nacked: Vec<Delivery>,
    published: Vec<(String, Vec<u8>)>,
    fail_publish: bool,
}

/// In-memory notification channel
///
/// A nacked delivery stays invisible for its retry delay, then goes back to
/// the end of the queue. The attempt counter is bumped on every receive.
#[derive(Clone, Default)]
pub struct MemoryChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message with raw attributes
    pub fn push_attributes(&self, attributes: HashMap<String, String>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        lock(&self.state).pending.push_back(Delivery {
            id: id.clone(),
            attributes,
            attempt: 0,
        });
        id
    }

    /// Enqueue an arrival notification
    pub fn push(&self, notification: &ArrivalNotification) -> String {
        self.push_attributes(notification.to_attributes())
    }

    /// Messages neither acked nor currently leased, including those waiting
    /// out a retry delay
    pub fn pending(&self) -> usize {
        let state = lock(&self.state);
        state.pending.len() + state.delayed.len()
    }

    pub fn leased(&self) -> usize {
        lock(&self.state).leased.len()
    }

    pub fn acked(&self) -> Vec<Delivery> {
        lock(&self.state).acked.clone()
    }

    pub fn nacked(&self) -> Vec<Delivery> {
        lock(&self.state).nacked.clone()
    }

    /// Everything published so far, as `(channel, payload)`
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.state).published.clone()
    }

    /// Make every subsequent publish fail
    pub fn fail_publish(&self, fail: bool) {
        lock(&self.state).fail_publish = fail;
    }
}

#[async_trait]
impl NotificationSource for MemoryChannel {
    async fn receive(&self) -> Result<Option<Delivery>> {
        let mut state = lock(&self.state);
        let now = Instant::now();
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.delayed)
            .into_iter()
            .partition(|(visible_at, _)| *visible_at <= now);
        state.delayed = waiting;
        state.pending.extend(due.into_iter().map(|(_, delivery)| delivery));

        Ok(state.pending.pop_front().map(|mut delivery| {
            delivery.attempt += 1;
            state.leased.insert(delivery.id.clone(), delivery.clone());
            delivery
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let mut state = lock(&self.state);
        let leased = state.leased.remove(&delivery.id).ok_or_else(|| {
            SluiceError::Channel(format!("Delivery {} is not leased", delivery.id))
        })?;
        state.acked.push(leased);
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, retry_after: Duration) -> Result<()> {
        let mut state = lock(&self.state);
        let leased = state.leased.remove(&delivery.id).ok_or_else(|| {
            SluiceError::Channel(format!("Delivery {} is not leased", delivery.id))
        })?;
        state.nacked.push(leased.clone());
        if retry_after.is_zero() {
            state.pending.push_back(leased);
        } else {
            state.delayed.push((Instant::now() + retry_after, leased));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationPublisher for MemoryChannel {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<String> {
        let mut state = lock(&self.state);
        if state.fail_publish {
            return Err(SluiceError::Channel(format!(
                "publish to '{channel}' refused"
            )));
        }
        state.published.push((channel.to_string(), payload.to_vec()));
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

type RejectFn = dyn Fn(&NormalizedEventRecord) -> Option<String> + Send + Sync;

#[derive(Default)]
struct WarehouseState {
    rows: Vec<(String, NormalizedEventRecord)>,
    calls: Vec<usize>,
    unavailable: bool,
}

/// In-memory warehouse
///
/// Accepts every row unless a rejection rule says otherwise.
#[derive(Clone, Default)]
pub struct MemoryWarehouse {
    state: Arc<Mutex<WarehouseState>>,
    reject: Option<Arc<RejectFn>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject rows for which `rule` returns an error message
    pub fn with_rejection<F>(rule: F) -> Self
    where
        F: Fn(&NormalizedEventRecord) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            state: Arc::default(),
            reject: Some(Arc::new(rule)),
        }
    }

    /// Make every subsequent insert fail as if the warehouse were down
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Accepted rows in insertion order
    pub fn rows(&self) -> Vec<NormalizedEventRecord> {
        lock(&self.state)
            .rows
            .iter()
            .map(|(_, row)| row.clone())
            .collect()
    }

    pub fn rows_in(&self, relation: &str) -> Vec<NormalizedEventRecord> {
        lock(&self.state)
            .rows
            .iter()
            .filter(|(r, _)| r == relation)
            .map(|(_, row)| row.clone())
            .collect()
    }

    /// Batch sizes of every insert call, in call order
    pub fn calls(&self) -> Vec<usize> {
        lock(&self.state).calls.clone()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn test_connection(&self) -> Result<()> {
        if lock(&self.state).unavailable {
            return Err(SluiceError::Warehouse("memory warehouse unavailable".into()));
        }
        Ok(())
    }

    async fn insert_rows(
        &self,
        relation: &str,
        rows: &[NormalizedEventRecord],
    ) -> Result<Vec<RowError>> {
        let mut state = lock(&self.state);
        if state.unavailable {
            return Err(SluiceError::Warehouse("memory warehouse unavailable".into()));
        }
        state.calls.push(rows.len());

        let mut rejected = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            match self.reject.as_ref().and_then(|rule| rule(row)) {
                Some(error) => rejected.push(RowError {
                    index,
                    user_id: row.user_id.clone(),
                    error,
                }),
                None => state.rows.push((relation.to_string(), row.clone())),
            }
        }
        Ok(rejected)
    }
}
