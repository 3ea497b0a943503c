//! Error handling utilities for MCP servers
//!
//! Provides traits and types for consistent error handling across MCP servers.

use rmcp::ErrorData as McpError;

/// Trait for converting errors into MCP-compatible errors
///
/// Implement this trait for a server's own error type so handlers can turn
/// it into an `ErrorData` with the right error code.
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::IntoMcpError;
/// use rmcp::ErrorData as McpError;
///
/// impl IntoMcpError for MyError {
///     fn into_mcp_error(self) -> McpError {
///         McpError::internal_error(self.to_string(), None)
///     }
/// }
/// ```
pub trait IntoMcpError {
    /// Convert this error into an MCP error
    fn into_mcp_error(self) -> McpError;
}

/// Create an internal error with a message
pub fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(message.into(), None)
}

/// Create an invalid params error with a message
///
/// Use this when a call names an unknown operation or its arguments do not
/// match the declared input schema.
pub fn invalid_params(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), None)
}

/// Create a resource-not-found error for a URI no template matches
pub fn resource_not_found(uri: impl Into<String>) -> McpError {
    let uri = uri.into();
    McpError::resource_not_found(
        format!("no resource matches '{}'", uri),
        Some(serde_json::json!({ "uri": uri })),
    )
}
