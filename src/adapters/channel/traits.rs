//! Notification channel traits
//!
//! The inbound side is lease based: a received [`Delivery`] stays invisible
//! to other consumers until it is acknowledged (gone for good) or
//! negatively acknowledged (visible again once its retry delay passes). A consumer that dies holding a
//! delivery loses its lease, and the channel hands the message out again.

use crate::domain::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// One leased inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel-assigned message id
    pub id: String,

    /// Message attributes (`body.contentType`, `body.id`, ...)
    pub attributes: HashMap<String, String>,

    /// How many times this message has been handed out, starting at 1
    pub attempt: u32,
}

/// Inbound side of a notification channel
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Lease the next available message, or `None` if the channel is empty
    async fn receive(&self) -> Result<Option<Delivery>>;

    /// Remove a processed message
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Release a message for redelivery after `retry_after`
    async fn nack(&self, delivery: &Delivery, retry_after: Duration) -> Result<()>;
}

/// Outbound side of a notification channel
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publish a payload to `channel`
    ///
    /// # Returns
    ///
    /// The channel-assigned message id.
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<String>;
}
