//! Database access layer
//!
//! A [`DbContext`] is built once at startup and handed to every operation.
//! It wraps one pooled [`Backend`]; the pool checks each connection before
//! lending it out, so a dropped server connection is replaced instead of
//! surfacing as a call error.

mod postgres;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;

use crate::config::{BackendKind, DbConfig};
use crate::error::DbError;
use crate::model::{ColumnDescriptor, Row};

pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

/// What a statement produced
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// The statement describes result columns; every row was fetched
    Rows(Vec<Row>),
    /// The statement returned nothing; count reported by the engine
    Affected(u64),
}

/// Engine-specific catalog queries and statement execution
#[async_trait]
pub trait Backend: Send + Sync {
    /// Names of the user tables in the default schema, sorted
    async fn table_names(&self) -> Result<Vec<String>, sqlx::Error>;

    /// Catalog columns of `table` in declaration order; empty if the table does not exist
    async fn columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, sqlx::Error>;

    /// Run `sql` verbatim inside a transaction on one pooled connection
    ///
    /// Row-returning statements are rolled back after the rows are read;
    /// anything else is committed.
    async fn execute(&self, sql: &str) -> Result<Execution, sqlx::Error>;

    /// Close every pooled connection
    async fn close(&self);
}

/// Process-wide database handle passed explicitly to each operation
#[derive(Clone)]
pub struct DbContext {
    backend: Arc<dyn Backend>,
}

impl DbContext {
    /// Open the pool described by `config`
    ///
    /// Connects eagerly so an unreachable database is reported at startup.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        tracing::info!(backend = ?config.backend, "Connecting to database");

        let ctx = match config.backend {
            BackendKind::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .test_before_acquire(true)
                    .connect(&config.url)
                    .await
                    .map_err(DbError::Connect)?;
                Self::new(PostgresBackend::new(pool))
            }
            BackendKind::Sqlite => {
                let max = if config.is_in_memory() {
                    1
                } else {
                    config.max_connections
                };
                let pool = SqlitePoolOptions::new()
                    .max_connections(max)
                    .test_before_acquire(true)
                    .connect(&config.url)
                    .await
                    .map_err(DbError::Connect)?;
                Self::new(SqliteBackend::new(pool))
            }
        };

        Ok(ctx)
    }

    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }
}

/// Quote an identifier for interpolation into SQL text
///
/// Double quotes are understood by both supported engines.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Placeholder used for binary values in JSON output
pub(crate) fn blob_placeholder(len: usize) -> serde_json::Value {
    serde_json::Value::String(format!("<blob {} bytes>", len))
}
