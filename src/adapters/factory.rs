//! Adapter factory
//!
//! Builds the concrete adapters selected by configuration. PostgreSQL
//! backs both the warehouse and the queue, over one shared pool.

use crate::adapters::channel::{NotificationPublisher, NotificationSource};
use crate::adapters::postgresql::{PgQueue, PostgreSQLAdapter, PostgreSQLClient};
use crate::adapters::storage::{FolderStore, HttpStore, ObjectStore};
use crate::adapters::warehouse::Warehouse;
use crate::config::{SluiceConfig, StorageBackend, StorageConfig};
use crate::domain::{Result, SluiceError};
use std::sync::Arc;
use std::time::Duration;

/// Create the object store named by `storage.backend`
///
/// # Errors
///
/// Returns a configuration error if the backend's required setting is
/// missing or malformed.
pub fn create_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Folder => {
            let root = config.root.clone().ok_or_else(|| {
                SluiceError::Configuration("storage.root is required for the folder backend".into())
            })?;
            Ok(Arc::new(FolderStore::new(root)))
        }
        StorageBackend::Http => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                SluiceError::Configuration("storage.base_url is required for the http backend".into())
            })?;
            Ok(Arc::new(HttpStore::new(base_url, config.timeout_seconds)?))
        }
    }
}

/// Every external dependency of a running pipeline
pub struct PostgresAdapters {
    pub client: Arc<PostgreSQLClient>,
    pub warehouse: Arc<dyn Warehouse>,
    pub source: Arc<dyn NotificationSource>,
    pub publisher: Arc<dyn NotificationPublisher>,
}

/// Create the PostgreSQL-backed warehouse, source and publisher
///
/// No connection is opened here; call [`prepare`] to verify connectivity
/// and create missing tables.
pub fn create_postgres_adapters(config: &SluiceConfig) -> Result<PostgresAdapters> {
    let client = Arc::new(PostgreSQLClient::new(config.postgresql.clone())?);
    let queue = Arc::new(PgQueue::new(
        Arc::clone(&client),
        &config.pipeline.source_channel,
        Duration::from_secs(config.pipeline.lease_seconds),
    )?);

    Ok(PostgresAdapters {
        warehouse: Arc::new(PostgreSQLAdapter::new_with_arc(Arc::clone(&client))),
        source: Arc::clone(&queue) as Arc<dyn NotificationSource>,
        publisher: queue,
        client,
    })
}

/// Test the connection and create the relation and queue tables
pub async fn prepare(client: &PostgreSQLClient, config: &SluiceConfig) -> Result<()> {
    client.test_connection().await?;
    client
        .ensure_events_table(&config.pipeline.destination_relation)
        .await?;
    client
        .ensure_queue_table(&config.pipeline.source_channel)
        .await?;
    client
        .ensure_queue_table(&config.pipeline.notification_channel)
        .await?;
    Ok(())
}
