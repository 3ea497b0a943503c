//! Result helpers for MCP tool responses
//!
//! Provides convenient functions for creating `CallToolResult` responses,
//! reducing boilerplate in tool implementations.

use rmcp::{model::CallToolResult, ErrorData as McpError};
use serde::Serialize;

/// Create a successful structured response
///
/// Tools that declare an output schema must return `structuredContent`;
/// this fills it and mirrors the JSON as text for clients that only read
/// content blocks.
pub fn structured_success<T: Serialize>(data: &T) -> Result<CallToolResult, McpError> {
    let value = serde_json::to_value(data)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::structured(value))
}
