//! Database MCP server implementation
//!
//! The protocol surface is assembled from the [`Registry`] instead of the
//! rmcp router macros: tools, resource templates and prompts share one
//! dispatch path with schema validation on the way in and out.

use std::future::Future;
use std::sync::Arc;

use mcp_common::{internal_error, structured_success, IntoMcpError, McpError};
use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, GetPromptRequestParam, GetPromptResult,
        Implementation, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
        ListToolsResult, PaginatedRequestParam, Prompt, ReadResourceRequestParam,
        ReadResourceResult, ResourceTemplate, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    RoleServer, ServerHandler,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::db::DbContext;
use crate::registry::{PromptOutput, Registry, RegistryError, ResourceContent};

const INSTRUCTIONS: &str = "Relational database MCP server. \
    Call list_tables to see which tables exist, read db://metadata/{table_name} for a \
    table's columns and db://sample-data/{table_name} for a few example rows, then use \
    run_sql to execute a query. If a query fails, get the handle_query_error prompt with \
    the error message for recovery steps.";

/// Database MCP Server
#[derive(Clone)]
pub struct DbMcpServer {
    ctx: DbContext,
    registry: Arc<Registry>,
}

impl DbMcpServer {
    /// Create a server over `ctx` exposing the database operations
    pub fn new(ctx: DbContext) -> Result<Self, RegistryError> {
        Ok(Self::with_registry(ctx, Registry::database()?))
    }

    pub fn with_registry(ctx: DbContext, registry: Registry) -> Self {
        Self {
            ctx,
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Release the connection pool
    pub async fn close(&self) {
        self.ctx.close().await;
    }
}

/// Decode a registry descriptor into its rmcp model type
fn from_wire<T: DeserializeOwned>(value: Value) -> Result<T, McpError> {
    serde_json::from_value(value).map_err(|e| internal_error(e.to_string()))
}

fn read_result(content: ResourceContent) -> Result<ReadResourceResult, McpError> {
    let text = serde_json::to_string_pretty(&content.body)
        .map_err(|e| internal_error(e.to_string()))?;
    from_wire(json!({
        "contents": [{
            "uri": content.uri,
            "mimeType": content.mime_type,
            "text": text,
        }]
    }))
}

fn prompt_result(output: PromptOutput) -> Result<GetPromptResult, McpError> {
    let messages: Vec<Value> = output
        .messages
        .into_iter()
        .map(|m| {
            json!({
                "role": m.role,
                "content": { "type": "text", "text": m.text },
            })
        })
        .collect();
    from_wire(json!({
        "description": output.description,
        "messages": messages,
    }))
}

impl ServerHandler for DbMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(
            self.registry
                .tool_descriptors()
                .into_iter()
                .map(from_wire::<Tool>)
                .collect::<Result<Vec<_>, _>>()
                .map(ListToolsResult::with_all_items),
        )
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            tracing::info!("call_tool: {}", request.name);
            let output = self
                .registry
                .call_tool(&self.ctx, &request.name, request.arguments)
                .await
                .map_err(IntoMcpError::into_mcp_error)?;
            structured_success(&output)
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        // Only templated resources are exposed
        std::future::ready(Ok(ListResourcesResult::with_all_items(Vec::new())))
    }

    fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListResourceTemplatesResult, McpError>> + Send + '_ {
        std::future::ready(
            self.registry
                .resource_template_descriptors()
                .into_iter()
                .map(from_wire::<ResourceTemplate>)
                .collect::<Result<Vec<_>, _>>()
                .map(ListResourceTemplatesResult::with_all_items),
        )
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            tracing::info!("read_resource: {}", request.uri);
            let content = self
                .registry
                .read_resource(&self.ctx, &request.uri)
                .await
                .map_err(IntoMcpError::into_mcp_error)?;
            read_result(content)
        }
    }

    fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListPromptsResult, McpError>> + Send + '_ {
        std::future::ready(
            self.registry
                .prompt_descriptors()
                .into_iter()
                .map(from_wire::<Prompt>)
                .collect::<Result<Vec<_>, _>>()
                .map(ListPromptsResult::with_all_items),
        )
    }

    fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<GetPromptResult, McpError>> + Send + '_ {
        tracing::info!("get_prompt: {}", request.name);
        std::future::ready(
            self.registry
                .get_prompt(&request.name, request.arguments)
                .map_err(IntoMcpError::into_mcp_error)
                .and_then(prompt_result),
        )
    }
}
