//! Domain error types
//!
//! This module defines the error hierarchy for Sluice.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Sluice error type
///
/// This is the primary error type used throughout the application.
/// Record-level problems never surface as `SluiceError`; they travel as
/// [`DecodeFailure`](crate::domain::DecodeFailure) values instead.
#[derive(Debug, Error)]
pub enum SluiceError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Object store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Warehouse transport errors (connection lost, pool exhausted)
    #[error("Warehouse error: {0}")]
    Warehouse(String),

    /// Notification channel errors
    #[error("Channel error: {0}")]
    Channel(String),

    /// File-level decode errors
    #[error("Decode error: {0}")]
    Decode(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl SluiceError {
    /// Whether this error must abort the current file and leave its
    /// notification for redelivery.
    ///
    /// Missing objects, malformed file ids and undecodable content will
    /// never succeed on retry, so they are quarantined instead.
    pub fn is_fatal_for_file(&self) -> bool {
        !matches!(
            self,
            SluiceError::Storage(StorageError::NotFound(_))
                | SluiceError::Storage(StorageError::InvalidFileId(_))
                | SluiceError::Decode(_)
        )
    }
}

/// Object store errors
///
/// These errors don't expose third-party HTTP or filesystem types.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The store could not be reached or returned an unexpected failure
    #[error("Object store unavailable: {0}")]
    Unavailable(String),

    /// The file identifier is not of the form `container/path`
    #[error("Invalid file id: {0}")]
    InvalidFileId(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for SluiceError {
    fn from(err: std::io::Error) -> Self {
        SluiceError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for SluiceError {
    fn from(err: serde_json::Error) -> Self {
        SluiceError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for SluiceError {
    fn from(err: toml::de::Error) -> Self {
        SluiceError::Configuration(format!("TOML parse error: {err}"))
    }
}
