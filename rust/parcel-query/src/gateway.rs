//! Execution gateway: the single place gated SQL reaches the database.

use crate::{config::ROW_LIMIT_CEILING, db::PgPool};
use async_trait::async_trait;
use diesel::deserialize::QueryableByName;
use diesel::sql_types::{Jsonb, Nullable};
use diesel_async::RunQueryDsl;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
    pub sql: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql: sql.into(),
        }
    }
}

/// Runs a read-only statement and returns each row as a JSON object.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<Vec<Value>, ExecutionError>;
}

#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
    max_rows: i64,
}

impl PgExecutor {
    pub fn new(pool: PgPool, max_rows: i64) -> Self {
        Self {
            pool,
            max_rows: max_rows.clamp(1, ROW_LIMIT_CEILING),
        }
    }
}

#[derive(Debug, QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = Nullable<Jsonb>)]
    result: Option<Value>,
}

/// Wraps the statement so every row comes back as a single JSONB column.
pub fn wrap_as_json(sql: &str, max_rows: i64) -> String {
    let inner = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT to_jsonb(q) AS result FROM ({inner}) AS q LIMIT {max_rows}")
}

/// Pool errors wrap `anyhow::Error`, which only offers `Debug` through bb8's `RunError`.
fn unavailable(err: &impl std::fmt::Debug, sql: &str) -> ExecutionError {
    ExecutionError::new(format!("database unavailable: {err:?}"), sql)
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, sql: &str) -> Result<Vec<Value>, ExecutionError> {
        let mut conn = self.pool.get().await.map_err(|err| {
            error!(error = ?err, "failed to acquire database connection");
            unavailable(&err, sql)
        })?;

        let wrapped = wrap_as_json(sql, self.max_rows);
        debug!(sql = %sql, "executing query");

        let rows: Vec<JsonRow> = diesel::sql_query(wrapped)
            .load(&mut *conn)
            .await
            .map_err(|err| ExecutionError::new(err.to_string(), sql))?;

        Ok(rows.into_iter().filter_map(|row| row.result).collect())
    }
}
