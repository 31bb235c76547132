//! Trigger-event publishing
//!
//! Records whose event name marks a business lifecycle moment are announced
//! on the notification channel as they pass through. Publishing is a side
//! branch: the record goes on to the warehouse whatever happens here.

use crate::adapters::channel::NotificationPublisher;
use crate::domain::NormalizedEventRecord;
use std::sync::Arc;

/// Event names that are republished downstream
pub const TRIGGER_EVENTS: [&str; 6] = [
    "first_event",
    "subscription_started",
    "non_subscription_purchase",
    "subscription_expired",
    "subscription_cancelled",
    "subscription_renewed",
];

/// Exact, case-sensitive membership in [`TRIGGER_EVENTS`]
pub fn is_trigger_event(event_name: &str) -> bool {
    TRIGGER_EVENTS.contains(&event_name)
}

/// What happened to one record on the trigger branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Not a trigger event
    Ignored,
    /// Published; carries the channel message id
    Published(String),
    /// Dry run, nothing sent
    Skipped,
    /// Publish failed; logged and counted only
    Failed(String),
}

pub struct TriggerPublisher {
    publisher: Arc<dyn NotificationPublisher>,
    channel: String,
    dry_run: bool,
}

impl TriggerPublisher {
    pub fn new(
        publisher: Arc<dyn NotificationPublisher>,
        channel: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            publisher,
            channel: channel.into(),
            dry_run,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish `record` if it is a trigger event
    ///
    /// Never fails; a publish error is logged at warn level and reported as
    /// [`TriggerOutcome::Failed`].
    pub async fn check_and_publish(&self, record: &NormalizedEventRecord) -> TriggerOutcome {
        if !is_trigger_event(&record.event_name) {
            return TriggerOutcome::Ignored;
        }

        if self.dry_run {
            tracing::info!(
                event_name = %record.event_name,
                user_id = %record.user_id,
                channel = %self.channel,
                "DRY RUN: Would publish trigger event"
            );
            return TriggerOutcome::Skipped;
        }

        let payload = match serde_json::to_vec(record) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    user_id = %record.user_id,
                    "Failed to serialize trigger event"
                );
                return TriggerOutcome::Failed(e.to_string());
            }
        };

        match self.publisher.publish(&self.channel, &payload).await {
            Ok(message_id) => {
                tracing::debug!(
                    event_name = %record.event_name,
                    user_id = %record.user_id,
                    message_id = %message_id,
                    "Trigger event published"
                );
                TriggerOutcome::Published(message_id)
            }
            Err(e) => {
                tracing::warn!(
                    event_name = %record.event_name,
                    user_id = %record.user_id,
                    channel = %self.channel,
                    error = %e,
                    "Failed to publish trigger event"
                );
                TriggerOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryChannel;
    use test_case::test_case;

    #[test_case("first_event", true)]
    #[test_case("subscription_started", true)]
    #[test_case("non_subscription_purchase", true)]
    #[test_case("subscription_expired", true)]
    #[test_case("subscription_cancelled", true)]
    #[test_case("subscription_renewed", true)]
    #[test_case("app_open", false)]
    #[test_case("First_Event", false)]
    #[test_case("", false)]
    fn test_is_trigger_event(name: &str, expected: bool) {
        assert_eq!(is_trigger_event(name), expected);
    }

    #[tokio::test]
    async fn test_publishes_only_trigger_events() {
        let channel = MemoryChannel::new();
        let publisher = TriggerPublisher::new(Arc::new(channel.clone()), "trigger_events", false);

        let trigger = NormalizedEventRecord::new("U1", "subscription_renewed", 1_700_000_000);
        let other = NormalizedEventRecord::new("U1", "app_open", 1_700_000_000);

        assert!(matches!(
            publisher.check_and_publish(&trigger).await,
            TriggerOutcome::Published(_)
        ));
        assert_eq!(publisher.check_and_publish(&other).await, TriggerOutcome::Ignored);

        let published = channel.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "trigger_events");
        let body: NormalizedEventRecord = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(body, trigger);
    }

    #[tokio::test]
    async fn test_publish_failure_is_reported_not_raised() {
        let channel = MemoryChannel::new();
        channel.fail_publish(true);
        let publisher = TriggerPublisher::new(Arc::new(channel.clone()), "trigger_events", false);

        let record = NormalizedEventRecord::new("U1", "first_event", 0);
        assert!(matches!(
            publisher.check_and_publish(&record).await,
            TriggerOutcome::Failed(_)
        ));
        assert!(channel.published().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_publishes_nothing() {
        let channel = MemoryChannel::new();
        let publisher = TriggerPublisher::new(Arc::new(channel.clone()), "trigger_events", true);

        let record = NormalizedEventRecord::new("U1", "first_event", 0);
        assert_eq!(publisher.check_and_publish(&record).await, TriggerOutcome::Skipped);
        assert!(channel.published().is_empty());
    }
}
