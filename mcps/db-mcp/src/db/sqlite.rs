//! SQLite backend

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Executor, Row as _, Statement, TypeInfo, ValueRef};

use super::{blob_placeholder, Backend, Execution};
use crate::model::{ColumnDescriptor, Row};

pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn table_names(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row.try_get::<String, _>(0)).collect()
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT name, type, \"notnull\", dflt_value FROM pragma_table_info(?1) ORDER BY cid",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ColumnDescriptor {
                    name: row.try_get("name")?,
                    data_type: row.try_get("type")?,
                    nullable: row.try_get::<i64, _>("notnull")? == 0,
                    default: row.try_get("dflt_value")?,
                })
            })
            .collect()
    }

    async fn execute(&self, sql: &str) -> Result<Execution, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let statement = (&mut *tx).prepare(sql).await?;

        if statement.columns().is_empty() {
            let done = statement.query().execute(&mut *tx).await?;
            tx.commit().await?;
            return Ok(Execution::Affected(done.rows_affected()));
        }

        let rows = statement.query().fetch_all(&mut *tx).await?;
        tx.rollback().await?;
        Ok(Execution::Rows(rows.iter().map(row_to_json).collect()))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_json(row: &SqliteRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), value_at(row, column.ordinal())))
        .collect()
}

/// Map one cell by its storage class
fn value_at(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let decoded = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(index).map(Value::from),
        "REAL" | "NUMERIC" => row.try_get::<f64, _>(index).map(Value::from),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| blob_placeholder(bytes.len())),
        _ => row.try_get::<String, _>(index).map(Value::String),
    };

    decoded.unwrap_or_else(|e| {
        tracing::debug!("Could not decode {} column {}: {}", type_name, index, e);
        Value::String(format!("<unsupported {}>", type_name))
    })
}
