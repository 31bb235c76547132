//! Notification channels

pub mod retry;
pub mod traits;

pub use retry::RetryPolicy;
pub use traits::{Delivery, NotificationPublisher, NotificationSource};
