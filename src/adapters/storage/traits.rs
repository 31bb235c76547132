//! Object store abstraction

use crate::domain::{FileId, Result};
use async_trait::async_trait;

/// Read access to dropped files
///
/// Implementations report a missing object as `StorageError::NotFound` and
/// every other failure to reach the store as `StorageError::Unavailable`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a whole object as UTF-8 text
    async fn read_text(&self, file_id: &FileId) -> Result<String>;

    /// Fetch an object into a seekable local handle, positioned at the start
    async fn open_blob(&self, file_id: &FileId) -> Result<std::fs::File>;

    /// Backend name, for logs
    fn backend(&self) -> &'static str;
}
