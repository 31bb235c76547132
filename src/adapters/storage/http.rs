//! HTTP object store
//!
//! Objects are fetched with `GET <base_url>/<container>/<path>`. Archives
//! are spooled chunk by chunk into an anonymous temporary file so the
//! decoder gets a seekable handle without the body ever sitting in memory.

use super::traits::ObjectStore;
use crate::domain::{FileId, Result, SluiceError, StorageError};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use std::io::SeekFrom;
use std::time::Duration;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use url::Url;

pub struct HttpStore {
    client: Client,
    base_url: Url,
}

impl HttpStore {
    /// Create a store rooted at `base_url`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL cannot hold path segments
    /// or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            SluiceError::Configuration(format!("Invalid storage.base_url '{base_url}': {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SluiceError::Configuration(format!(
                "storage.base_url '{base_url}' cannot hold object paths"
            )));
        }

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                SluiceError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, base_url })
    }

    /// Object URL, with every path segment percent-encoded
    fn object_url(&self, file_id: &FileId) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(file_id.container())
                .extend(file_id.path().split('/').filter(|s| !s.is_empty()));
        }
        url
    }

    async fn get(&self, file_id: &FileId) -> Result<Response> {
        let url = self.object_url(file_id);
        tracing::debug!(url = %url, "Fetching object");

        let resp = self.client.get(url.clone()).send().await.map_err(|e| {
            SluiceError::from(StorageError::Unavailable(format!("GET {url}: {e}")))
        })?;

        match resp.status() {
            status if status.is_success() => Ok(resp),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(file_id.to_string()).into()),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(StorageError::Unavailable(format!("GET {url}: {status} {body}")).into())
            }
        }
    }
}

fn transfer_error(file_id: &FileId, err: impl std::fmt::Display) -> SluiceError {
    StorageError::Unavailable(format!("transfer of {file_id} failed: {err}")).into()
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn read_text(&self, file_id: &FileId) -> Result<String> {
        let resp = self.get(file_id).await?;
        let body = resp.bytes().await.map_err(|e| transfer_error(file_id, e))?;
        String::from_utf8(body.to_vec())
            .map_err(|e| SluiceError::Decode(format!("{file_id} is not valid UTF-8: {e}")))
    }

    async fn open_blob(&self, file_id: &FileId) -> Result<std::fs::File> {
        let mut resp = self.get(file_id).await?;

        let spool = tempfile::tempfile()?;
        let mut spool = tokio::fs::File::from_std(spool);
        let mut total = 0usize;

        while let Some(chunk) = resp.chunk().await.map_err(|e| transfer_error(file_id, e))? {
            spool.write_all(&chunk).await?;
            total += chunk.len();
        }

        spool.flush().await?;
        spool.seek(SeekFrom::Start(0)).await?;
        tracing::debug!(file_id = %file_id, bytes = total, "Spooled object to temporary file");

        Ok(spool.into_std().await)
    }

    fn backend(&self) -> &'static str {
        "http"
    }
}
