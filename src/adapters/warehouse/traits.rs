//! Warehouse abstraction traits
//!
//! This module defines the traits that warehouse adapters must implement
//! to receive normalized records.

use crate::domain::{NormalizedEventRecord, Result};
use async_trait::async_trait;

/// A row the warehouse refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Position of the row in the submitted batch
    pub index: usize,

    /// `user_id` of the rejected row, for log correlation
    pub user_id: String,

    /// Error message from the warehouse
    pub error: String,
}

/// Warehouse write API
///
/// One call writes one batch. Rows the warehouse rejects come back as
/// [`RowError`]s; all other rows of the batch stay written. An `Err` means
/// the warehouse could not be reached at all.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Test the warehouse connection
    ///
    /// # Errors
    ///
    /// Returns an error if the connection test fails.
    async fn test_connection(&self) -> Result<()>;

    /// Insert a batch of records into `relation`
    ///
    /// # Arguments
    ///
    /// * `relation` - Target table, optionally schema-qualified
    /// * `rows` - Records to insert
    ///
    /// # Returns
    ///
    /// Per-row errors, empty when every row was accepted.
    ///
    /// # Errors
    ///
    /// Returns `SluiceError::Warehouse` on transport failure.
    async fn insert_rows(
        &self,
        relation: &str,
        rows: &[NormalizedEventRecord],
    ) -> Result<Vec<RowError>>;
}
