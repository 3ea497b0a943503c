//! Tool-related utilities for the Agent
//!
//! This module contains helpers for:
//! - Converting MCP tools to Ollama format
//! - Cleaning JSON schemas for Ollama compatibility
//! - Rendering tool results as text for the model

use rmcp::model::{CallToolResult, RawContent};
use serde_json::{json, Value};

use crate::llm::{ToolSpec, ToolSpecFunction};
use crate::mcp::McpTool;

/// Clean up a JSON schema for Ollama compatibility
/// Removes $schema, title, and other fields that confuse Ollama
pub fn clean_schema_for_ollama(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => Value::Object(
            obj.iter()
                .filter(|(key, _)| {
                    !matches!(key.as_str(), "$schema" | "title" | "additionalProperties")
                })
                .map(|(key, value)| (key.clone(), clean_schema_for_ollama(value)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.iter().map(clean_schema_for_ollama).collect()),
        other => other.clone(),
    }
}

/// Convert MCP tools to Ollama tool definitions
pub fn mcp_tools_to_specs(tools: &[McpTool]) -> Vec<ToolSpec> {
    tools
        .iter()
        .map(|tool| {
            let parameters = tool
                .input_schema
                .as_ref()
                .map(clean_schema_for_ollama)
                .unwrap_or_else(|| json!({"type": "object", "properties": {}}));

            ToolSpec {
                tool_type: "function".to_string(),
                function: ToolSpecFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone().unwrap_or_default(),
                    parameters,
                },
            }
        })
        .collect()
}

/// Flatten a tool result into the text handed back to the model
///
/// Structured content wins when present; otherwise text blocks are joined.
pub fn render_tool_result(result: &CallToolResult) -> String {
    if let Some(structured) = &result.structured_content {
        return structured.to_string();
    }

    result
        .content
        .iter()
        .map(|content| match &content.raw {
            RawContent::Text(text) => text.text.clone(),
            other => format!("{:?}", other),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
