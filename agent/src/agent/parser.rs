//! Recovering tool calls and JSON from reply text
//!
//! Some models write a tool call as JSON in the message content instead of
//! the `tool_calls` array, or wrap structured output in a code fence.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::llm::ToolCall;

#[derive(Deserialize)]
struct ContentToolCall {
    name: String,
    arguments: serde_json::Value,
}

/// Parse `{"name": "...", "arguments": {...}}` written as plain content
pub fn parse_content_tool_call(content: &str) -> Option<ToolCall> {
    let parsed: ContentToolCall = serde_json::from_str(strip_code_fence(content)).ok()?;
    Some(ToolCall::new(parsed.name, parsed.arguments))
}

/// The body of a fenced ```json block, or the trimmed input if there is none
pub fn strip_code_fence(content: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n(.*?)\n?\s*```\s*$").expect("valid fence regex")
    });

    match fence.captures(content).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => content.trim(),
    }
}
