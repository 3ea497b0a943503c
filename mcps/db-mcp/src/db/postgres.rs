//! PostgreSQL backend
//!
//! Catalog data comes from `information_schema`, restricted to the
//! connection's `current_schema()`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Column, Executor, Row as _, Statement, TypeInfo, ValueRef};

use super::{blob_placeholder, Backend, Execution};
use crate::model::{ColumnDescriptor, Row};

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    async fn table_names(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            select table_name::text as table_name
            from information_schema.tables
            where table_schema = current_schema()
              and table_type = 'BASE TABLE'
            order by table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("table_name"))
            .collect()
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            select column_name::text as column_name,
                   data_type::text as data_type,
                   is_nullable::text as is_nullable,
                   column_default::text as column_default
            from information_schema.columns
            where table_schema = current_schema() and table_name = $1
            order by ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ColumnDescriptor {
                    name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    nullable: row.try_get::<String, _>("is_nullable")? == "YES",
                    default: row.try_get("column_default")?,
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

fn row_to_json(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), value_at(row, column.ordinal())))
        .collect()
}

/// Map one cell by its Postgres type name
///
/// Types without a dedicated mapping are read as text; enums, `citext`
/// and similar types send their text form on the wire.
fn value_at(row: &PgRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let decoded = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::from),
        "INT2" => row.try_get::<i16, _>(index).map(Value::from),
        "INT4" => row.try_get::<i32, _>(index).map(Value::from),
        "INT8" => row.try_get::<i64, _>(index).map(Value::from),
        "OID" => row.try_get::<Oid, _>(index).map(|oid| Value::from(oid.0)),
        "FLOAT4" => row.try_get::<f32, _>(index).map(|v| Value::from(f64::from(v))),
        "FLOAT8" => row.try_get::<f64, _>(index).map(Value::from),
        "NUMERIC" => row
            .try_get::<BigDecimal, _>(index)
            .map(|v| Value::String(v.to_string())),
        "MONEY" => row
            .try_get::<PgMoney, _>(index)
            .map(|v| Value::String(v.to_bigdecimal(2).to_string())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index),
        "UUID" => row.try_get::<Uuid, _>(index).map(|v| Value::String(v.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|v| Value::String(v.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|v| Value::String(v.to_string())),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .map(|v| Value::String(v.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(index)
            .map(|v| Value::String(v.to_string())),
        "INTERVAL" => row
            .try_get::<PgInterval, _>(index)
            .map(|v| Value::String(format_interval(v.months, v.days, v.microseconds))),
        "INET" | "CIDR" => row
            .try_get::<IpNetwork, _>(index)
            .map(|v| Value::String(v.to_string())),
        "BYTEA" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| blob_placeholder(bytes.len())),
        array if array.ends_with("[]") => array_at(row, index, array.trim_end_matches("[]")),
        _ => row.try_get_unchecked::<String, _>(index).map(Value::String),
    };

    decoded.unwrap_or_else(|e| {
        tracing::debug!("Could not decode {} column {}: {}", type_name, index, e);
        Value::String(format!("<unsupported {}>", type_name))
    })
}

/// One-dimensional arrays of the common element types; others as text items
fn array_at(row: &PgRow, index: usize, element: &str) -> Result<Value, sqlx::Error> {
    fn items<T: Into<Value>>(values: Vec<Option<T>>) -> Value {
        Value::Array(
            values
                .into_iter()
                .map(|v| v.map_or(Value::Null, Into::into))
                .collect(),
        )
    }

    match element {
        "BOOL" => row.try_get::<Vec<Option<bool>>, _>(index).map(items),
        "INT2" => row.try_get::<Vec<Option<i16>>, _>(index).map(items),
        "INT4" => row.try_get::<Vec<Option<i32>>, _>(index).map(items),
        "INT8" => row.try_get::<Vec<Option<i64>>, _>(index).map(items),
        "FLOAT4" => row.try_get::<Vec<Option<f32>>, _>(index).map(items),
        "FLOAT8" => row.try_get::<Vec<Option<f64>>, _>(index).map(items),
        "NUMERIC" => row
            .try_get::<Vec<Option<BigDecimal>>, _>(index)
            .map(|v| items(v.into_iter().map(|d| d.map(|d| d.to_string())).collect())),
        "UUID" => row
            .try_get::<Vec<Option<Uuid>>, _>(index)
            .map(|v| items(v.into_iter().map(|u| u.map(|u| u.to_string())).collect())),
        "JSON" | "JSONB" => row.try_get::<Vec<Option<Value>>, _>(index).map(items),
        _ => row.try_get_unchecked::<Vec<Option<String>>, _>(index).map(items),
    }
}

/// Render an interval the way `psql` does, e.g. `1 year 2 mons 3 days 04:05:06`
fn format_interval(months: i32, days: i32, microseconds: i64) -> String {
    fn unit(parts: &mut Vec<String>, value: i64, singular: &str, plural: &str) {
        if value != 0 {
            let name = if value.abs() == 1 { singular } else { plural };
            parts.push(format!("{} {}", value, name));
        }
    }

    let mut parts = Vec::new();
    unit(&mut parts, i64::from(months / 12), "year", "years");
    unit(&mut parts, i64::from(months % 12), "mon", "mons");
    unit(&mut parts, i64::from(days), "day", "days");

    if microseconds != 0 || parts.is_empty() {
        let sign = if microseconds < 0 { "-" } else { "" };
        let total = microseconds.unsigned_abs();
        let secs = total / 1_000_000;
        let frac = total % 1_000_000;
        let mut clock = format!("{}{:02}:{:02}:{:02}", sign, secs / 3600, secs / 60 % 60, secs % 60);
        if frac != 0 {
            clock.push_str(format!(".{:06}", frac).trim_end_matches('0'));
        }
        parts.push(clock);
    }

    parts.join(" ")
}
