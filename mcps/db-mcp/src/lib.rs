//! Database MCP Library
//!
//! Exposes a relational database to MCP clients: table listing, column
//! metadata and sample rows for orientation, raw SQL execution, and a
//! recovery prompt for failed queries. PostgreSQL and SQLite are supported.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use db_mcp::{DbConfig, DbContext, DbMcpServer};
//!
//! let config = DbConfig::new(Some("sqlite://books.db".into()), 5)?;
//! let server = DbMcpServer::new(DbContext::connect(&config).await?)?;
//! mcp_common::serve_stdio(server, "db_mcp").await?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod guidance;
pub mod introspect;
pub mod model;
pub mod registry;
pub mod server;

// Re-export main server type
pub use server::DbMcpServer;

pub use config::{BackendKind, DbConfig, DEFAULT_MAX_CONNECTIONS};
pub use db::DbContext;
pub use error::DbError;
pub use guidance::{build_recovery_guidance, GuidanceMessage, MessageRole};
pub use model::{ColumnDescriptor, QueryResult, SampleDataView, TableDescriptor, TableList};
pub use registry::{DispatchError, Registry, RegistryError};
