//! SQLite warehouse for local development and tests

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool, ValueRef};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::{Dialect, Record, SqlValue, Statement, Warehouse};
use crate::error::{Error, Result};
use crate::time::format_timestamp;

/// Warehouse backed by a sqlx SQLite pool
#[derive(Clone)]
pub struct SqliteWarehouse {
    pool: SqlitePool,
}

impl SqliteWarehouse {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::Connection(format!("Failed to open {}: {}", path.display(), e))
            })?;

        Ok(Self { pool })
    }

    /// Private in-memory database; a single connection keeps the data alive
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Replace `:name` markers with `?` and collect values in marker order
fn to_positional(statement: &Statement) -> Result<(String, Vec<SqlValue>)> {
    let mut sql = String::with_capacity(statement.sql.len());
    let mut values = Vec::new();
    let mut last = 0;

    for marker in statement.markers() {
        let value = statement.param(&marker.name).ok_or_else(|| {
            Error::query(
                format!("No value bound for parameter :{}", marker.name),
                statement.sql.clone(),
            )
        })?;
        sql.push_str(&statement.sql[last..marker.start]);
        sql.push('?');
        values.push(value.clone());
        last = marker.end;
    }
    sql.push_str(&statement.sql[last..]);

    Ok((sql, values))
}

fn row_to_record(row: &SqliteRow) -> Record {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let value = row
                .try_get_raw(i)
                .ok()
                .and_then(|raw| {
                    if raw.is_null() {
                        Some(Value::Null)
                    } else {
                        row.try_get::<String, _>(i)
                            .ok()
                            .map(Value::String)
                            .or_else(|| row.try_get::<i64, _>(i).ok().map(|v| json!(v)))
                            .or_else(|| row.try_get::<f64, _>(i).ok().map(|v| json!(v)))
                    }
                })
                .unwrap_or(Value::Null);
            (col.name().to_string(), value)
        })
        .collect()
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Record>> {
        let (sql, values) = to_positional(statement)?;
        debug!(sql = %statement.render_inline(), "Executing SQLite statement");

        let mut query = sqlx::query(&sql);
        for value in values {
            query = match value {
                SqlValue::Null => query.bind(Option::<String>::None),
                SqlValue::Bool(b) => query.bind(b),
                SqlValue::Int(i) => query.bind(i),
                SqlValue::Float(f) => query.bind(f),
                SqlValue::Text(s) => query.bind(s),
                SqlValue::Timestamp(ts) => query.bind(format_timestamp(&ts)),
            };
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::query(e.to_string(), statement.render_inline()))?;

        Ok(rows.iter().map(row_to_record).collect())
    }
}
