//! Object identifier types with validation

use crate::domain::errors::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage location of a dropped file, `container/path`
///
/// The first `/` separates the container from the object path; the path
/// may itself contain further `/` separators.
///
/// # Examples
///
/// ```
/// use sluice::domain::ids::FileId;
/// use std::str::FromStr;
///
/// let id = FileId::from_str("drops/2024/01/events.zip").unwrap();
/// assert_eq!(id.container(), "drops");
/// assert_eq!(id.path(), "2024/01/events.zip");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileId {
    container: String,
    path: String,
}

impl FileId {
    /// Parses a `container/path` identifier
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidFileId` if either part is empty, or the
    /// path is absolute or contains a `..` segment.
    pub fn new(id: impl Into<String>) -> Result<Self, StorageError> {
        let id = id.into();
        let trimmed = id.trim();

        let (container, path) = trimmed
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidFileId(format!("missing '/' in '{id}'")))?;

        if container.is_empty() {
            return Err(StorageError::InvalidFileId(format!(
                "empty container in '{id}'"
            )));
        }
        if path.is_empty() || path.starts_with('/') {
            return Err(StorageError::InvalidFileId(format!("empty path in '{id}'")));
        }
        if container == ".." || path.split('/').any(|segment| segment == "..") {
            return Err(StorageError::InvalidFileId(format!(
                "parent segment in '{id}'"
            )));
        }

        Ok(Self {
            container: container.to_string(),
            path: path.to_string(),
        })
    }

    /// Container (bucket) name
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Object path inside the container
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.path)
    }
}

impl FromStr for FileId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for FileId {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.to_string()
    }
}
