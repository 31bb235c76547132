//! PostgreSQL adapter implementing the warehouse trait
//!
//! A batch is written inside one transaction. Each row gets its own
//! savepoint, so a row the server rejects is rolled back on its own and
//! reported while the rest of the batch commits.

use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::insert_event_sql;
use crate::adapters::warehouse::{RowError, Warehouse};
use crate::domain::{NormalizedEventRecord, Result, SluiceError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_postgres::types::{Json, ToSql};

/// PostgreSQL implementation of [`Warehouse`]
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Create a new PostgreSQL adapter with an Arc-wrapped client
    pub fn new_with_arc(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

fn transport_error(context: &str, err: tokio_postgres::Error) -> SluiceError {
    SluiceError::Warehouse(format!("{context}: {err}"))
}

#[async_trait]
impl Warehouse for PostgreSQLAdapter {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn insert_rows(
        &self,
        relation: &str,
        rows: &[NormalizedEventRecord],
    ) -> Result<Vec<RowError>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let sql = insert_event_sql(relation)?;
        let mut conn = self.client.get_connection().await?;
        let mut tx = conn
            .transaction()
            .await
            .map_err(|e| transport_error("Failed to begin transaction", e))?;
        let stmt = tx
            .prepare_cached(&sql)
            .await
            .map_err(|e| transport_error("Failed to prepare insert", e))?;

        let mut rejected = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            let event_parameters = row.event_parameters.as_ref().map(Json);
            let params: [&(dyn ToSql + Sync); 13] = [
                &row.user_id,
                &row.event_name,
                &row.event_datetime,
                &row.city,
                &row.region,
                &row.country,
                &row.os,
                &row.app_version,
                &row.state,
                &event_parameters,
                &row.proceeds_usd,
                &row.profile_total_revenue_usd,
                &row.cancellation_reason,
            ];

            let savepoint = tx
                .transaction()
                .await
                .map_err(|e| transport_error("Failed to open savepoint", e))?;

            match savepoint.execute(&stmt, &params).await {
                Ok(_) => {
                    savepoint
                        .commit()
                        .await
                        .map_err(|e| transport_error("Failed to release savepoint", e))?;
                }
                Err(e) if e.as_db_error().is_some() => {
                    savepoint
                        .rollback()
                        .await
                        .map_err(|e| transport_error("Failed to roll back savepoint", e))?;
                    tracing::debug!(
                        index,
                        user_id = %row.user_id,
                        error = %e,
                        "Row rejected by warehouse"
                    );
                    rejected.push(RowError {
                        index,
                        user_id: row.user_id.clone(),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(transport_error("Insert failed", e)),
            }
        }

        tx.commit()
            .await
            .map_err(|e| transport_error("Failed to commit batch", e))?;

        tracing::debug!(
            relation = %relation,
            inserted = rows.len() - rejected.len(),
            rejected = rejected.len(),
            "Batch committed"
        );

        Ok(rejected)
    }
}
