//! Statement execution against PostgreSQL.

use super::connection::DbPool;
use crate::error::{QueryError, Result};
use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Executor, Row as _, TypeInfo};
use tracing::{debug, info};

/// Issued first in every execution transaction.
pub const READ_ONLY_TRANSACTION: &str = "SET TRANSACTION READ ONLY";

/// One result row: column name to scalar, in select-list order.
pub type Row = serde_json::Map<String, Value>;

/// Runs one already-validated read-only statement.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>>;
}

pub struct PgStatementExecutor {
    pool: DbPool,
}

impl PgStatementExecutor {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatementExecutor for PgStatementExecutor {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>> {
        // Held for this statement only; rolled back and returned to the pool
        // on drop, error or not.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| QueryError::Execution(format!("Failed to acquire connection: {}", e)))?;
        sqlx::query(READ_ONLY_TRANSACTION)
            .execute(&mut *tx)
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))?;

        debug!(sql, "Executing statement");
        // Simple-query protocol: every value arrives in text format, which
        // lets NUMERIC and timestamp columns decode without extra type support.
        let conn: &mut PgConnection = &mut tx;
        let records = conn
            .fetch_all(sqlx::raw_sql(sql))
            .await
            .map_err(|e| QueryError::Execution(e.to_string()))?;

        tx.rollback().await.map_err(|e| QueryError::Execution(e.to_string()))?;

        let rows = records.iter().map(row_to_json).collect::<Result<Vec<_>>>()?;
        info!(rows = rows.len(), "Statement executed");
        Ok(rows)
    }
}

fn row_to_json(record: &PgRow) -> Result<Row> {
    let mut row = Row::new();
    for column in record.columns() {
        let text: Option<String> = record
            .try_get_unchecked(column.ordinal())
            .map_err(|e| QueryError::Execution(format!("Failed to read column {}: {}", column.name(), e)))?;
        let value = match text {
            Some(text) => text_to_json(column.type_info().name(), text),
            None => Value::Null,
        };
        row.insert(column.name().to_string(), value);
    }
    Ok(row)
}

/// Converts a text-format value to JSON according to its PostgreSQL type name.
pub fn text_to_json(type_name: &str, text: String) -> Value {
    match type_name {
        "INT2" | "INT4" | "INT8" | "OID" => match text.parse::<i64>() {
            Ok(n) => Value::Number(n.into()),
            Err(_) => Value::String(text),
        },
        "FLOAT4" | "FLOAT8" | "NUMERIC" => match text.parse::<f64>().ok().and_then(Number::from_f64) {
            Some(n) => Value::Number(n),
            None => Value::String(text),
        },
        "BOOL" => match text.as_str() {
            "t" => Value::Bool(true),
            "f" => Value::Bool(false),
            _ => Value::String(text),
        },
        "JSON" | "JSONB" => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}
