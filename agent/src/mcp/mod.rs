//! MCP (Model Context Protocol) client side
//!
//! The agent reaches the server through [`ToolExecutor`]. Resource templates
//! and prompts are offered to the model as callable operations next to the
//! server's tools; [`OperationKind`] records how each one is invoked.
//! The production implementation is [`McpSession`], one long-lived
//! child-process connection to the database server.

mod session;

pub use session::McpSession;

use std::sync::OnceLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;
use rmcp::model::{CallToolResult, JsonObject};
use serde_json::{json, Map, Value};

/// How a listed operation is invoked on the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// `tools/call`
    Tool,
    /// `resources/read` on the template filled from the call arguments
    Resource { uri_template: String },
    /// `prompts/get`
    Prompt,
}

/// An operation from an MCP server, in the shape offered to the model
#[derive(Debug, Clone, PartialEq)]
pub struct McpTool {
    /// Operation name
    pub name: String,
    /// Operation description
    pub description: Option<String>,
    /// Input schema (JSON)
    pub input_schema: Option<Value>,
    pub kind: OperationKind,
}

impl McpTool {
    pub fn tool(name: impl Into<String>, description: Option<String>, input_schema: Option<Value>) -> Self {
        Self {
            name: name.into(),
            description,
            input_schema,
            kind: OperationKind::Tool,
        }
    }

    /// Build from a `resources/templates/list` entry
    ///
    /// Each template variable becomes a required string argument.
    pub fn from_resource_template(template: &Value) -> Option<Self> {
        let uri_template = template.get("uriTemplate")?.as_str()?.to_string();
        let name = template.get("name")?.as_str()?.to_string();

        let variables = template_variables(&uri_template);
        let properties: Map<String, Value> = variables
            .iter()
            .map(|var| {
                (
                    var.clone(),
                    json!({
                        "type": "string",
                        "description": format!("Value for {{{}}} in {}", var, uri_template),
                    }),
                )
            })
            .collect();

        let description = match template.get("description").and_then(Value::as_str) {
            Some(text) => format!("{} (reads {})", text, uri_template),
            None => format!("Reads {}", uri_template),
        };

        Some(Self {
            name,
            description: Some(description),
            input_schema: Some(json!({
                "type": "object",
                "properties": properties,
                "required": variables,
            })),
            kind: OperationKind::Resource { uri_template },
        })
    }

    /// Build from a `prompts/list` entry; prompt arguments are strings
    pub fn from_prompt(prompt: &Value) -> Option<Self> {
        let name = prompt.get("name")?.as_str()?.to_string();
        let arguments = prompt
            .get("arguments")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut properties = Map::new();
        let mut required = Vec::new();
        for argument in &arguments {
            let Some(arg_name) = argument.get("name").and_then(Value::as_str) else {
                continue;
            };
            let mut property = json!({"type": "string"});
            if let Some(description) = argument.get("description") {
                property["description"] = description.clone();
            }
            properties.insert(arg_name.to_string(), property);
            if argument.get("required").and_then(Value::as_bool) == Some(true) {
                required.push(arg_name.to_string());
            }
        }

        Some(Self {
            name,
            description: prompt
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            input_schema: Some(json!({
                "type": "object",
                "properties": properties,
                "required": required,
            })),
            kind: OperationKind::Prompt,
        })
    }
}

fn template_variable_regex() -> &'static Regex {
    static VARIABLE: OnceLock<Regex> = OnceLock::new();
    VARIABLE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid variable regex"))
}

/// Variable names of `template` in order of appearance
pub fn template_variables(template: &str) -> Vec<String> {
    template_variable_regex()
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect()
}

/// Fill every `{var}` of `template` from the JSON object `arguments`
pub fn expand_uri_template(template: &str, arguments: &Value) -> Result<String> {
    let mut uri = template.to_string();
    for var in template_variables(template) {
        let value = match arguments.get(&var) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => bail!("missing argument '{}' for {}", var, template),
        };
        uri = uri.replace(&format!("{{{}}}", var), &value);
    }
    Ok(uri)
}

/// Prompt arguments as the string map `prompts/get` expects; nulls are dropped
pub fn prompt_arguments(arguments: Option<Value>) -> Option<JsonObject> {
    let Some(Value::Object(map)) = arguments else {
        return None;
    };
    Some(
        map.into_iter()
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(s) => Some((key, Value::String(s))),
                other => Some((key, Value::String(other.to_string()))),
            })
            .collect(),
    )
}

/// Text of a `resources/read` result (wire JSON)
pub fn resource_text(result: &Value) -> String {
    result["contents"]
        .as_array()
        .map(|contents| {
            contents
                .iter()
                .filter_map(|c| c["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// Text of a `prompts/get` result (wire JSON), one block per message
pub fn prompt_text(result: &Value) -> String {
    result["messages"]
        .as_array()
        .map(|messages| {
            messages
                .iter()
                .filter_map(|m| m["content"]["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .unwrap_or_default()
}

/// Source of operations for the agent loop
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Every operation the model may call: tools, resource templates, prompts
    async fn list_tools(&mut self) -> Result<Vec<McpTool>>;

    /// Call `name` with JSON object arguments
    async fn call_tool(&mut self, name: &str, arguments: Option<Value>) -> Result<CallToolResult>;

    /// Read the resource at `uri` and return its text
    async fn read_resource(&mut self, uri: &str) -> Result<String>;

    /// Render the prompt `name` and return its message text
    async fn get_prompt(&mut self, name: &str, arguments: Option<Value>) -> Result<String>;

    /// Close the connection; later calls fail
    async fn shutdown(&mut self) -> Result<()>;
}
