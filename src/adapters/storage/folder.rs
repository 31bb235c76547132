//! Local directory object store
//!
//! Containers are subdirectories of the root: `drops/a/b.csv` resolves to
//! `<root>/drops/a/b.csv`.

use super::traits::ObjectStore;
use crate::domain::{FileId, Result, SluiceError, StorageError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct FolderStore {
    root: PathBuf,
}

impl FolderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, file_id: &FileId) -> PathBuf {
        let mut path = self.root.join(file_id.container());
        for segment in file_id.path().split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

fn map_io_error(file_id: &FileId, path: &Path, err: std::io::Error) -> SluiceError {
    match err.kind() {
        ErrorKind::NotFound => StorageError::NotFound(file_id.to_string()).into(),
        ErrorKind::InvalidData => {
            SluiceError::Decode(format!("{} is not valid UTF-8: {err}", path.display()))
        }
        _ => StorageError::Unavailable(format!("{}: {err}", path.display())).into(),
    }
}

#[async_trait]
impl ObjectStore for FolderStore {
    async fn read_text(&self, file_id: &FileId) -> Result<String> {
        let path = self.resolve(file_id);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| map_io_error(file_id, &path, e))
    }

    async fn open_blob(&self, file_id: &FileId) -> Result<std::fs::File> {
        let path = self.resolve(file_id);
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| map_io_error(file_id, &path, e))?;
        Ok(file.into_std().await)
    }

    fn backend(&self) -> &'static str {
        "folder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_text_and_blob() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("drops/2024")).unwrap();
        std::fs::write(dir.path().join("drops/2024/a.csv"), "user_id\nU1\n").unwrap();

        let store = FolderStore::new(dir.path());
        let id = FileId::new("drops/2024/a.csv").unwrap();

        assert_eq!(store.read_text(&id).await.unwrap(), "user_id\nU1\n");

        let mut blob = store.open_blob(&id).await.unwrap();
        let mut content = String::new();
        blob.read_to_string(&mut content).unwrap();
        assert_eq!(content, "user_id\nU1\n");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FolderStore::new(dir.path());
        let id = FileId::new("drops/missing.zip").unwrap();

        let err = store.open_blob(&id).await.unwrap_err();
        assert!(matches!(
            err,
            SluiceError::Storage(StorageError::NotFound(_))
        ));
        assert!(!err.is_fatal_for_file());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decode_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("drops")).unwrap();
        std::fs::write(dir.path().join("drops/bad.csv"), b"\xff\xfe").unwrap();

        let store = FolderStore::new(dir.path());
        let err = store
            .read_text(&FileId::new("drops/bad.csv").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SluiceError::Decode(_)));
    }
}
