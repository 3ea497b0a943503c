//! MCP Common - Shared utilities for MCP servers
//!
//! This crate provides common functionality used by the MCP servers in this
//! workspace:
//!
//! - **Initialization**: [`init_tracing`] and [`serve_stdio`] for standardized server startup
//! - **Results**: [`structured_success`] for tools with an output schema
//! - **Errors**: Traits for converting errors to MCP-compatible format
//! - **Schemas**: JSON schema objects derived from `schemars` types
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_common::{serve_stdio, structured_success};
//!
//! // In main.rs, once the server has been built from its configuration
//! serve_stdio(server, "my_mcp").await?;
//!
//! // In handlers
//! fn my_tool(&self) -> Result<CallToolResult, McpError> {
//!     structured_success(&get_some_data())
//! }
//! ```

pub mod error;
pub mod init;
pub mod result;
pub mod schema;

// Re-export commonly used items at crate root
pub use error::{internal_error, invalid_params, resource_not_found, IntoMcpError};
pub use init::{init_tracing, serve_stdio};
pub use result::structured_success;
pub use schema::{schema_object, SchemaError};

// Re-export rmcp types that are commonly needed
pub use rmcp::{
    model::{CallToolResult, JsonObject},
    ErrorData as McpError,
};
