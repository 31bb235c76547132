//! PostgreSQL client implementation
//!
//! This module provides the pooled client shared by the warehouse and the
//! queue adapters.

use super::models::{create_events_table_sql, create_queue_table_sql};
use crate::config::schema::PostgreSQLConfig;
use crate::domain::{Result, SluiceError};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::NoTls;

/// PostgreSQL client for Sluice
///
/// Wraps a connection pool. Every pooled connection carries the configured
/// statement timeout.
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// Connections are opened lazily; use [`Self::test_connection`] to fail
    /// fast at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string or TLS setup is invalid.
    pub fn new(config: PostgreSQLConfig) -> Result<Self> {
        let mut pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_ref()
            .parse()
            .map_err(|e| {
                SluiceError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
            })?;

        pg_config.options(&format!(
            "-c statement_timeout={}",
            config.statement_timeout_seconds * 1000
        ));

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode.as_str() {
            "disable" => {
                pg_config.ssl_mode(SslMode::Disable);
                Manager::from_config(pg_config, NoTls, manager_config)
            }
            mode => {
                let verify = matches!(mode, "verify-ca" | "verify-full");
                pg_config.ssl_mode(match mode {
                    "allow" | "prefer" => SslMode::Prefer,
                    _ => SslMode::Require,
                });

                let connector = native_tls::TlsConnector::builder()
                    .danger_accept_invalid_certs(!verify)
                    .danger_accept_invalid_hostnames(mode != "verify-full")
                    .build()
                    .map_err(|e| {
                        SluiceError::Configuration(format!("Failed to build TLS connector: {e}"))
                    })?;
                Manager::from_config(pg_config, MakeTlsConnector::new(connector), manager_config)
            }
        };

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .map_err(|e| {
                SluiceError::Configuration(format!("Failed to create connection pool: {e}"))
            })?;

        Ok(Self { pool, config })
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| SluiceError::Warehouse(format!("Connection test failed: {e}")))?;

        tracing::info!(server = %self.connection_string_safe(), "PostgreSQL connection test successful");
        Ok(())
    }

    /// Create the event relation if it does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the relation name is not a SQL identifier or the
    /// DDL fails.
    pub async fn ensure_events_table(&self, relation: &str) -> Result<()> {
        let sql = create_events_table_sql(relation)?;
        self.batch_execute(&sql).await?;
        tracing::info!(relation = %relation, "Event relation ready");
        Ok(())
    }

    /// Create a queue table if it does not exist
    pub async fn ensure_queue_table(&self, channel: &str) -> Result<()> {
        let sql = create_queue_table_sql(channel)?;
        self.batch_execute(&sql).await?;
        tracing::info!(channel = %channel, "Queue table ready");
        Ok(())
    }

    async fn batch_execute(&self, sql: &str) -> Result<()> {
        let client = self.get_connection().await?;
        client
            .batch_execute(sql)
            .await
            .map_err(|e| SluiceError::Warehouse(format!("Failed to execute DDL: {e}")))
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    ///
    /// Returns `SluiceError::Warehouse` if a connection cannot be obtained.
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            SluiceError::Warehouse(format!("Failed to get connection from pool: {e}"))
        })
    }

    /// Get the connection string (without password)
    pub fn connection_string_safe(&self) -> String {
        redact_connection_string(self.config.connection_string.expose_secret().as_ref())
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

fn redact_connection_string(conn: &str) -> String {
    conn.rsplit_once('@')
        .map(|(_, host)| format!("postgresql://***@{host}"))
        .unwrap_or_else(|| "postgresql://***".to_string())
}
