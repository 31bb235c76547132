//! Table-backed notification channel
//!
//! Each channel is a table. Receiving leases the oldest visible row with
//! `FOR UPDATE SKIP LOCKED`, so several pipeline instances can share one
//! subscription. An expired lease makes the row visible again, which gives
//! at-least-once delivery when a consumer dies mid-file. A nack pushes the
//! lease out by the retry delay instead of clearing it.

use crate::adapters::channel::{Delivery, NotificationPublisher, NotificationSource};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{
    delete_message_sql, enqueue_message_sql, lease_message_sql, release_message_sql,
};
use crate::domain::{Result, SluiceError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::types::{Json, ToSql};

pub struct PgQueue {
    client: Arc<PostgreSQLClient>,
    subscription: String,
    lease: Duration,
}

impl PgQueue {
    /// Create a queue reading from the `subscription` table
    ///
    /// # Errors
    ///
    /// Returns `SluiceError::Validation` if the subscription is not a valid
    /// table name.
    pub fn new(client: Arc<PostgreSQLClient>, subscription: &str, lease: Duration) -> Result<Self> {
        // Fail at construction rather than on the first poll
        lease_message_sql(subscription)?;
        Ok(Self {
            client,
            subscription: subscription.to_string(),
            lease,
        })
    }

    fn message_id(delivery: &Delivery) -> Result<i64> {
        delivery
            .id
            .parse()
            .map_err(|_| SluiceError::Channel(format!("Malformed delivery id '{}'", delivery.id)))
    }

    async fn settle(
        &self,
        sql: String,
        delivery: &Delivery,
        action: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<()> {
        let id = Self::message_id(delivery)?;
        let conn = self.client.get_connection().await?;
        let mut all: Vec<&(dyn ToSql + Sync)> = vec![&id];
        all.extend_from_slice(params);
        conn.execute(&sql, &all)
            .await
            .map_err(|e| SluiceError::Channel(format!("Failed to {action} message {id}: {e}")))?;
        tracing::trace!(id, action, "Message settled");
        Ok(())
    }
}

fn attributes_from_json(value: Value) -> HashMap<String, String> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect(),
        _ => HashMap::new(),
    }
}

#[async_trait]
impl NotificationSource for PgQueue {
    async fn receive(&self) -> Result<Option<Delivery>> {
        let sql = lease_message_sql(&self.subscription)?;
        let conn = self.client.get_connection().await?;
        let lease_secs = self.lease.as_secs_f64();

        let row = conn
            .query_opt(&sql, &[&lease_secs])
            .await
            .map_err(|e| SluiceError::Channel(format!("Failed to lease message: {e}")))?;

        Ok(row.map(|row| {
            let id: i64 = row.get("id");
            let attributes: Value = row.get("attributes");
            let deliveries: i32 = row.get("deliveries");
            Delivery {
                id: id.to_string(),
                attributes: attributes_from_json(attributes),
                attempt: u32::try_from(deliveries).unwrap_or(0),
            }
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.settle(delete_message_sql(&self.subscription)?, delivery, "ack", &[])
            .await
    }

    async fn nack(&self, delivery: &Delivery, retry_after: Duration) -> Result<()> {
        let retry_secs = retry_after.as_secs_f64();
        self.settle(
            release_message_sql(&self.subscription)?,
            delivery,
            "nack",
            &[&retry_secs],
        )
        .await
    }
}

#[async_trait]
impl NotificationPublisher for PgQueue {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<String> {
        let sql = enqueue_message_sql(channel)?;
        let conn = self.client.get_connection().await?;
        let attributes: HashMap<String, String> = HashMap::new();

        let row = conn
            .query_one(&sql, &[&Json(&attributes), &payload])
            .await
            .map_err(|e| {
                SluiceError::Channel(format!("Failed to publish to '{channel}': {e}"))
            })?;

        let id: i64 = row.get(0);
        Ok(id.to_string())
    }
}
