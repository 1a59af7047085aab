use std::time::Instant;

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;
use tracing::info;

use crate::metrics::record_query_duration;

/// Enumeration of errors for operations against the warehouse.
/// Errors can originate from sqlx and are wrapped by us to provide additional context.
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("connection failed with: {error}")]
    ConnectionError { error: sqlx::Error },
    #[error("{command} query failed with: {error}")]
    QueryError {
        command: String,
        error: sqlx::Error,
    },
}

pub type WarehouseResult<T> = std::result::Result<T, WarehouseError>;

/// One row of the raw events table, in column order.
/// `time_created` is kept as the broker sent it; the warehouse casts it on insert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub event_type: String,
    pub id: String,
    pub project: Option<String>,
    pub metadata: String,
    pub time_created: String,
    pub signature: String,
    pub msg_id: String,
    pub source: String,
}

/// The raw events table of a PostgreSQL warehouse, addressed by a fixed dataset (schema) and table.
#[derive(Clone)]
pub struct PgWarehouse {
    dataset: String,
    table: String,
    pool: PgPool,
}

impl PgWarehouse {
    /// Initialize a new PgWarehouse. The pool connects lazily, on the first statement.
    pub fn new(
        dataset: &str,
        table: &str,
        url: &str,
        max_connections: u32,
    ) -> WarehouseResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
            .map_err(|error| WarehouseError::ConnectionError { error })?;
        info!(dataset, table, "created warehouse connection pool");

        Ok(Self::new_from_pool(dataset, table, pool))
    }

    /// Initialize a PgWarehouse from an existing pool.
    pub fn new_from_pool(dataset: &str, table: &str, pool: PgPool) -> Self {
        Self {
            dataset: dataset.to_owned(),
            table: table.to_owned(),
            pool,
        }
    }

    fn qualified_table(&self) -> String {
        format!(r#""{}"."{}""#, self.dataset, self.table)
    }

    /// Insert one row. Returns `false` when a row with the same signature already exists,
    /// which is how broker redeliveries are absorbed.
    pub async fn insert_event(&self, row: &EventRow) -> WarehouseResult<bool> {
        // TODO: Escaping. sqlx doesn't bind identifiers, so dataset and table come from config only.
        let base_query = format!(
            r#"
INSERT INTO {}
    (event_type, id, project, metadata, time_created, signature, msg_id, source)
VALUES
    ($1, $2, $3, $4, $5::timestamptz, $6, $7, $8)
ON CONFLICT (signature) DO NOTHING
            "#,
            self.qualified_table()
        );

        let started = Instant::now();
        let result = sqlx::query(&base_query)
            .bind(&row.event_type)
            .bind(&row.id)
            .bind(&row.project)
            .bind(&row.metadata)
            .bind(&row.time_created)
            .bind(&row.signature)
            .bind(&row.msg_id)
            .bind(&row.source)
            .execute(&self.pool)
            .await
            .map_err(|error| WarehouseError::QueryError {
                command: "INSERT".to_owned(),
                error,
            })?;
        record_query_duration("insert", started);

        Ok(result.rows_affected() > 0)
    }

    /// Set the project of every row whose id is `change_id`. Returns the number of rows updated.
    pub async fn set_change_project(&self, change_id: &str, project: &str) -> WarehouseResult<u64> {
        let base_query = format!(
            r#"
UPDATE {}
SET
    project = $1
WHERE
    id = $2
            "#,
            self.qualified_table()
        );

        let started = Instant::now();
        let result = sqlx::query(&base_query)
            .bind(project)
            .bind(change_id)
            .execute(&self.pool)
            .await
            .map_err(|error| WarehouseError::QueryError {
                command: "UPDATE".to_owned(),
                error,
            })?;
        record_query_duration("update", started);

        Ok(result.rows_affected())
    }
}
