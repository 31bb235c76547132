//! Redelivery backoff for nacked messages

use std::time::Duration;

/// Exponential backoff between redeliveries of a failing message
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Coefficient to multiply the interval with on every new attempt
    pub backoff_coefficient: u32,
    /// Delay before the second attempt
    pub initial_interval: Duration,
    /// Upper bound on any single delay
    pub maximum_interval: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(
        backoff_coefficient: u32,
        initial_interval: Duration,
        maximum_interval: Option<Duration>,
    ) -> Self {
        Self {
            backoff_coefficient,
            initial_interval,
            maximum_interval,
        }
    }

    /// How long a message should stay invisible after its `attempt`-th
    /// delivery failed
    ///
    /// Attempts count from 1, so the first failure waits `initial_interval`.
    pub fn time_until_next_retry(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let candidate = self
            .backoff_coefficient
            .checked_pow(exponent)
            .and_then(|factor| self.initial_interval.checked_mul(factor));

        match (candidate, self.maximum_interval) {
            (Some(interval), Some(max)) => interval.min(max),
            (Some(interval), None) => interval,
            (None, Some(max)) => max,
            (None, None) => Duration::MAX,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_coefficient: 2,
            initial_interval: Duration::from_secs(5),
            maximum_interval: Some(Duration::from_secs(300)),
        }
    }
}
