//! Operation registry
//!
//! Tools, resources and prompts live in three separate namespaces. Each
//! entry carries its caller-facing documentation and the JSON schemas of its
//! input (and, for tools, output). Calls are checked against those schemas
//! before a handler runs, and tool results are checked before they leave.
//!
//! Names are unique per namespace; resources are keyed by their URI
//! template. Entries are held in sorted maps, so listings and template
//! matching do not depend on registration order.

use std::collections::BTreeMap;
use std::fmt;

use jsonschema::Validator;
use mcp_common::{
    internal_error, invalid_params, resource_not_found, schema_object, IntoMcpError, JsonObject,
    McpError, SchemaError,
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::DbContext;
use crate::error::DbError;
use crate::guidance::{build_recovery_guidance, GuidanceMessage};
use crate::model::{QueryResult, SampleDataView, TableDescriptor, TableList};
use crate::{executor, introspect};

// ============================================================================
// Parameter Types
// ============================================================================

/// Parameters for the list_tables tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTablesParams {}

/// Parameters for the run_sql tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RunSqlParams {
    /// SQL statement to execute verbatim
    pub sql_query: String,
}

/// Path variable of the table resources
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TableParams {
    /// Name of the table
    #[schemars(length(min = 1))]
    pub table_name: String,
}

/// Arguments of the handle_query_error prompt
#[derive(Debug, Deserialize, JsonSchema)]
pub struct HandleQueryErrorParams {
    /// Error message returned by the failed query
    #[schemars(length(min = 1))]
    pub error_message: String,
    /// Table the query was aimed at, if known
    pub table_name: Option<String>,
    /// The SQL that failed
    pub sql_query: Option<String>,
}

/// Rendered prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptOutput {
    pub description: String,
    pub messages: Vec<GuidanceMessage>,
}

/// Body of a resource read
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: &'static str,
    pub body: Value,
}

// ============================================================================
// Operation kinds and handlers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Tool,
    Resource,
    Prompt,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Tool => write!(f, "tool"),
            OperationKind::Resource => write!(f, "resource"),
            OperationKind::Prompt => write!(f, "prompt"),
        }
    }
}

/// Handler enum of one namespace
pub trait Handler: Copy + fmt::Debug {
    const KIND: OperationKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolHandler {
    ListTables,
    RunSql,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceHandler {
    SampleData,
    Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptHandler {
    HandleQueryError,
}

impl Handler for ToolHandler {
    const KIND: OperationKind = OperationKind::Tool;
}

impl Handler for ResourceHandler {
    const KIND: OperationKind = OperationKind::Resource;
}

impl Handler for PromptHandler {
    const KIND: OperationKind = OperationKind::Prompt;
}

// ============================================================================
// Errors
// ============================================================================

/// Problems detected while building the registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: OperationKind, name: String },

    #[error("invalid URI template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("invalid schema for '{name}': {message}")]
    InvalidSchema { name: String, message: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Problems with a single call
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown {kind} '{name}'")]
    UnknownOperation { kind: OperationKind, name: String },

    #[error("no resource template matches '{0}'")]
    UnmatchedUri(String),

    #[error("invalid input for '{name}': {message}")]
    InvalidInput { name: String, message: String },

    #[error("output of '{name}' does not match its declared schema: {message}")]
    InvalidOutput { name: String, message: String },

    #[error(transparent)]
    Database(#[from] DbError),

    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl IntoMcpError for DispatchError {
    fn into_mcp_error(self) -> McpError {
        match self {
            DispatchError::UnknownOperation { .. } | DispatchError::InvalidInput { .. } => {
                invalid_params(self.to_string())
            }
            DispatchError::UnmatchedUri(uri) => resource_not_found(uri),
            other => internal_error(other.to_string()),
        }
    }
}

// ============================================================================
// URI templates
// ============================================================================

/// A URI template with exactly one `{variable}` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    template: String,
    prefix: String,
    variable: String,
    suffix: String,
}

impl UriTemplate {
    pub fn parse(template: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let open = template.find('{').ok_or_else(|| invalid("no placeholder"))?;
        let close = template[open..]
            .find('}')
            .map(|i| open + i)
            .ok_or_else(|| invalid("unterminated placeholder"))?;

        let variable = &template[open + 1..close];
        if variable.is_empty() {
            return Err(invalid("empty placeholder"));
        }
        let suffix = &template[close + 1..];
        if suffix.contains('{') || suffix.contains('}') || template[..open].contains('}') {
            return Err(invalid("more than one placeholder"));
        }

        Ok(Self {
            template: template.to_string(),
            prefix: template[..open].to_string(),
            variable: variable.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Value of the placeholder in `uri`, if the URI matches this template
    ///
    /// The value must be non-empty and a single path segment.
    pub fn extract<'a>(&self, uri: &'a str) -> Option<&'a str> {
        let value = uri
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        if value.is_empty() || value.contains('/') {
            return None;
        }
        Some(value)
    }
}

// ============================================================================
// Entries
// ============================================================================

/// One registered operation
pub struct Entry<H: Handler> {
    pub name: String,
    pub title: String,
    pub description: String,
    pub handler: H,
    input_schema: JsonObject,
    input_validator: Validator,
    output_schema: Option<JsonObject>,
    output_validator: Option<Validator>,
    template: Option<UriTemplate>,
}

impl<H: Handler> Entry<H> {
    /// Create an entry whose input shape is `I`
    pub fn new<I: JsonSchema>(
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        handler: H,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        let input_schema = schema_object::<I>()?;
        let input_validator = compile(&name, &input_schema)?;

        Ok(Self {
            name,
            title: title.into(),
            description: description.into(),
            handler,
            input_schema,
            input_validator,
            output_schema: None,
            output_validator: None,
            template: None,
        })
    }

    pub fn input_schema(&self) -> &JsonObject {
        &self.input_schema
    }

    pub fn output_schema(&self) -> Option<&JsonObject> {
        self.output_schema.as_ref()
    }

    /// Key within the namespace: the URI template for resources, the name otherwise
    pub fn key(&self) -> &str {
        self.template
            .as_ref()
            .map(UriTemplate::as_str)
            .unwrap_or(&self.name)
    }

    fn check_input(&self, args: &Value) -> Result<(), DispatchError> {
        validate(&self.input_validator, args).map_err(|message| DispatchError::InvalidInput {
            name: self.key().to_string(),
            message,
        })
    }

    fn parse_input<T: DeserializeOwned>(&self, args: Value) -> Result<T, DispatchError> {
        self.check_input(&args)?;
        serde_json::from_value(args).map_err(|e| DispatchError::InvalidInput {
            name: self.key().to_string(),
            message: e.to_string(),
        })
    }
}

impl Entry<ToolHandler> {
    /// Declare the output shape `O` of a tool
    pub fn with_output<O: JsonSchema>(mut self) -> Result<Self, RegistryError> {
        let schema = schema_object::<O>()?;
        self.output_validator = Some(compile(&self.name, &schema)?);
        self.output_schema = Some(schema);
        Ok(self)
    }

    fn check_output(&self, value: &Value) -> Result<(), DispatchError> {
        match &self.output_validator {
            Some(validator) => {
                validate(validator, value).map_err(|message| DispatchError::InvalidOutput {
                    name: self.name.clone(),
                    message,
                })
            }
            None => Ok(()),
        }
    }
}

impl Entry<ResourceHandler> {
    /// Bind the resource to its URI template
    ///
    /// The template variable must be a property of the input schema.
    pub fn at(mut self, template: &str) -> Result<Self, RegistryError> {
        let template = UriTemplate::parse(template)?;
        let declared = self
            .input_schema
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| props.contains_key(template.variable()));
        if !declared {
            return Err(RegistryError::InvalidTemplate {
                template: template.as_str().to_string(),
                reason: format!("'{}' is not an input field", template.variable()),
            });
        }
        self.template = Some(template);
        Ok(self)
    }
}

fn compile(name: &str, schema: &JsonObject) -> Result<Validator, RegistryError> {
    jsonschema::validator_for(&Value::Object(schema.clone())).map_err(|e| {
        RegistryError::InvalidSchema {
            name: name.to_string(),
            message: e.to_string(),
        }
    })
}

fn validate(validator: &Validator, instance: &Value) -> Result<(), String> {
    let errors: Vec<String> = validator
        .iter_errors(instance)
        .map(|e| {
            let path = e.instance_path().to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

struct Namespace<H: Handler> {
    entries: BTreeMap<String, Entry<H>>,
}

impl<H: Handler> Namespace<H> {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    fn insert(&mut self, entry: Entry<H>) -> Result<(), RegistryError> {
        let key = entry.key().to_string();
        if self.entries.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                kind: H::KIND,
                name: key,
            });
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<&Entry<H>, DispatchError> {
        self.entries
            .get(name)
            .ok_or_else(|| DispatchError::UnknownOperation {
                kind: H::KIND,
                name: name.to_string(),
            })
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Name-keyed catalog of every operation the server exposes
pub struct Registry {
    tools: Namespace<ToolHandler>,
    resources: Namespace<ResourceHandler>,
    prompts: Namespace<PromptHandler>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            tools: Namespace::new(),
            resources: Namespace::new(),
            prompts: Namespace::new(),
        }
    }

    /// The database surface: two tools, two table resources, one prompt
    pub fn database() -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        registry.register_tool(
            Entry::new::<ListTablesParams>(
                "list_tables",
                "List Database Tables",
                "List all tables in the connected database. Use this when you don't know which tables exist.",
                ToolHandler::ListTables,
            )?
            .with_output::<TableList>()?,
        )?;

        registry.register_tool(
            Entry::new::<RunSqlParams>(
                "run_sql",
                "Run SQL Query",
                "Execute a SQL query and return results. Row-returning statements give `rows`; \
                 other statements are committed and report the affected row count. Failures \
                 come back with success=false and the database error message.",
                ToolHandler::RunSql,
            )?
            .with_output::<QueryResult>()?,
        )?;

        registry.register_resource(
            Entry::new::<TableParams>(
                "sample_data",
                "Sample data and schema for a table",
                "Provides a few sample rows and the column names for the given table, to help \
                 understand its structure before running queries.",
                ResourceHandler::SampleData,
            )?
            .at("db://sample-data/{table_name}")?,
        )?;

        registry.register_resource(
            Entry::new::<TableParams>(
                "describe_table",
                "Describe Table Schema",
                "Describe the columns of a table: names, types, nullability and defaults. \
                 Read this when you need to learn a table's structure.",
                ResourceHandler::Metadata,
            )?
            .at("db://metadata/{table_name}")?,
        )?;

        registry.register_prompt(Entry::new::<HandleQueryErrorParams>(
            "handle_query_error",
            "Handle SQL query error",
            "When a SQL query fails, guide the model to inspect tables or schema and retry safely.",
            PromptHandler::HandleQueryError,
        )?)?;

        Ok(registry)
    }

    pub fn register_tool(&mut self, entry: Entry<ToolHandler>) -> Result<(), RegistryError> {
        self.tools.insert(entry)
    }

    pub fn register_resource(
        &mut self,
        entry: Entry<ResourceHandler>,
    ) -> Result<(), RegistryError> {
        if entry.template.is_none() {
            return Err(RegistryError::InvalidTemplate {
                template: entry.name.clone(),
                reason: "resource registered without a URI template".to_string(),
            });
        }
        self.resources.insert(entry)
    }

    pub fn register_prompt(&mut self, entry: Entry<PromptHandler>) -> Result<(), RegistryError> {
        self.prompts.insert(entry)
    }

    pub fn tools(&self) -> impl Iterator<Item = &Entry<ToolHandler>> {
        self.tools.entries.values()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Entry<ResourceHandler>> {
        self.resources.entries.values()
    }

    pub fn prompts(&self) -> impl Iterator<Item = &Entry<PromptHandler>> {
        self.prompts.entries.values()
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Call tool `name` with the raw JSON arguments of the request
    pub async fn call_tool(
        &self,
        ctx: &DbContext,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<Value, DispatchError> {
        let entry = self.tools.get(name)?;
        let args = Value::Object(arguments.unwrap_or_default());
        tracing::debug!("Dispatching tool {}", name);

        let output = match entry.handler {
            ToolHandler::ListTables => {
                let _: ListTablesParams = entry.parse_input(args)?;
                let table_list = introspect::list_tables(ctx).await?;
                serde_json::to_value(TableList { table_list })?
            }
            ToolHandler::RunSql => {
                let params: RunSqlParams = entry.parse_input(args)?;
                serde_json::to_value(executor::run_sql(ctx, &params.sql_query).await)?
            }
        };

        entry.check_output(&output)?;
        Ok(output)
    }

    /// Find the resource whose template matches `uri`
    pub fn resolve_resource<'a>(
        &self,
        uri: &'a str,
    ) -> Result<(&Entry<ResourceHandler>, &'a str), DispatchError> {
        self.resources
            .entries
            .values()
            .find_map(|entry| {
                let template = entry.template.as_ref()?;
                template.extract(uri).map(|value| (entry, value))
            })
            .ok_or_else(|| DispatchError::UnmatchedUri(uri.to_string()))
    }

    /// Read the resource addressed by a concrete URI
    pub async fn read_resource(
        &self,
        ctx: &DbContext,
        uri: &str,
    ) -> Result<ResourceContent, DispatchError> {
        let (entry, value) = self.resolve_resource(uri)?;
        let variable = entry
            .template
            .as_ref()
            .map(UriTemplate::variable)
            .unwrap_or("table_name");
        let params: TableParams = entry.parse_input(json!({ variable: value }))?;
        tracing::debug!("Reading resource {}", uri);

        let body = match entry.handler {
            ResourceHandler::SampleData => {
                let view: SampleDataView = introspect::sample_rows(ctx, &params.table_name).await;
                serde_json::to_value(view)?
            }
            ResourceHandler::Metadata => {
                let descriptor: TableDescriptor =
                    introspect::describe_table(ctx, &params.table_name).await;
                serde_json::to_value(descriptor)?
            }
        };

        Ok(ResourceContent {
            uri: uri.to_string(),
            mime_type: "application/json",
            body,
        })
    }

    /// Render prompt `name`
    pub fn get_prompt(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<PromptOutput, DispatchError> {
        let entry = self.prompts.get(name)?;
        let args = Value::Object(arguments.unwrap_or_default());

        match entry.handler {
            PromptHandler::HandleQueryError => {
                let params: HandleQueryErrorParams = entry.parse_input(args)?;
                Ok(PromptOutput {
                    description: entry.description.clone(),
                    messages: build_recovery_guidance(
                        &params.error_message,
                        params.table_name.as_deref(),
                        params.sql_query.as_deref(),
                    ),
                })
            }
        }
    }

    // ------------------------------------------------------------------------
    // Protocol descriptors
    // ------------------------------------------------------------------------

    /// Tool listing in MCP wire shape
    pub fn tool_descriptors(&self) -> Vec<Value> {
        self.tools()
            .map(|entry| {
                let mut tool = json!({
                    "name": entry.name,
                    "title": entry.title,
                    "description": entry.description,
                    "inputSchema": entry.input_schema,
                });
                if let Some(output) = &entry.output_schema {
                    tool["outputSchema"] = Value::Object(output.clone());
                }
                tool
            })
            .collect()
    }

    /// Resource template listing in MCP wire shape
    pub fn resource_template_descriptors(&self) -> Vec<Value> {
        self.resources()
            .map(|entry| {
                json!({
                    "uriTemplate": entry.key(),
                    "name": entry.name,
                    "title": entry.title,
                    "description": entry.description,
                    "mimeType": "application/json",
                })
            })
            .collect()
    }

    /// Prompt listing in MCP wire shape; arguments come from the input schema
    pub fn prompt_descriptors(&self) -> Vec<Value> {
        self.prompts()
            .map(|entry| {
                json!({
                    "name": entry.name,
                    "title": entry.title,
                    "description": entry.description,
                    "arguments": prompt_arguments(&entry.input_schema),
                })
            })
            .collect()
    }
}

fn prompt_arguments(schema: &JsonObject) -> Vec<Value> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| {
                    let mut argument = json!({
                        "name": name,
                        "required": required.contains(&name.as_str()),
                    });
                    if let Some(description) = prop.get("description") {
                        argument["description"] = description.clone();
                    }
                    argument
                })
                .collect()
        })
        .unwrap_or_default()
}
