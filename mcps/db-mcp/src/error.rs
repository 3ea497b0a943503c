//! Error types for the database MCP server

use mcp_common::{IntoMcpError, McpError};

/// Database-level failures
///
/// `MissingDatabaseUrl` and `UnsupportedScheme` are startup errors: the
/// binary exits before serving. Everything else happens per call and is
/// either folded into a result envelope or returned as a call failure.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("DB_URL not provided. Pass `--db-url` or set DB_URL to connect to a database.")]
    MissingDatabaseUrl,

    #[error("unsupported database URL scheme '{0}' (expected postgres:// or sqlite:)")]
    UnsupportedScheme(String),

    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

impl IntoMcpError for DbError {
    fn into_mcp_error(self) -> McpError {
        McpError::internal_error(self.to_string(), None)
    }
}
