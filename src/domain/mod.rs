//! Domain models and types for Sluice.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`FileId`])
//! - **Notifications** ([`ArrivalNotification`])
//! - **Records** ([`NormalizedEventRecord`], [`DecodeFailure`], [`ErrorRecord`])
//! - **Error types** ([`SluiceError`], [`StorageError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, SluiceError>`]:
//!
//! ```rust
//! use sluice::domain::{FileId, Result};
//!
//! fn example() -> Result<()> {
//!     let id = FileId::new("drops/events.csv")?;
//!     assert_eq!(id.container(), "drops");
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod notification;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{SluiceError, StorageError};
pub use ids::FileId;
pub use notification::ArrivalNotification;
pub use record::{DecodeFailure, DecodeOutcome, ErrorRecord, NormalizedEventRecord};
pub use result::Result;
