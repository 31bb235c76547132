//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Configurable log levels
//! - Console output
//! - JSON-formatted local log files with rotation
//!
//! # Example
//!
//! ```no_run
//! use sluice::logging::init_logging;
//! use sluice::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a file
///
/// # Example
///
/// ```no_run
/// use sluice::log_file_received;
///
/// log_file_received!("drops/2024/a.csv", "csv");
/// ```
#[macro_export]
macro_rules! log_file_received {
    ($file_id:expr, $kind:expr) => {
        tracing::info!(
            file_id = %$file_id,
            kind = %$kind,
            "Processing file"
        );
    };
}

/// Log the completion of a file
///
/// # Example
///
/// ```no_run
/// use sluice::log_file_complete;
/// use std::time::Duration;
///
/// log_file_complete!("drops/2024/a.csv", 42, 1, Duration::from_millis(350));
/// ```
#[macro_export]
macro_rules! log_file_complete {
    ($file_id:expr, $written:expr, $quarantined:expr, $duration:expr) => {
        tracing::info!(
            file_id = %$file_id,
            written = $written,
            quarantined = $quarantined,
            duration_ms = $duration.as_millis(),
            "File completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use sluice::log_error_with_context;
/// use sluice::domain::SluiceError;
///
/// let error = SluiceError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log how a delivery was settled
///
/// # Example
///
/// ```no_run
/// use sluice::log_delivery_settled;
///
/// log_delivery_settled!("42", 1, "ack");
/// ```
#[macro_export]
macro_rules! log_delivery_settled {
    ($delivery_id:expr, $attempt:expr, $action:expr) => {
        tracing::debug!(
            delivery_id = %$delivery_id,
            attempt = $attempt,
            action = $action,
            "Delivery settled"
        )
    };
}
