//! Persistent MCP client session
//!
//! Spawns the server once and keeps the connection for the life of the
//! REPL. The operation listing (tools, resource templates and prompts) is
//! cached after the first request.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParam, CallToolResult, GetPromptRequestParam, ReadResourceRequestParam},
    service::RunningService,
    transport::TokioChildProcess,
    RoleClient, ServiceExt,
};
use serde_json::Value;
use tokio::process::Command;

use super::{prompt_arguments, prompt_text, resource_text, McpTool, ToolExecutor};
use crate::config::McpServerConfig;

/// Default startup timeout for spawning and initializing an MCP server
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Live connection to one MCP server child process
pub struct McpSession {
    name: String,
    service: Option<RunningService<RoleClient, ()>>,
    tools_cache: Option<Vec<McpTool>>,
}

impl McpSession {
    /// Spawn the server described by `config` and complete the MCP handshake
    pub async fn connect(name: &str, config: &McpServerConfig) -> Result<Self> {
        Self::connect_with_timeout(name, config, DEFAULT_STARTUP_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        name: &str,
        config: &McpServerConfig,
        startup_timeout: Duration,
    ) -> Result<Self> {
        tracing::debug!("Connecting to MCP server: {} ({})", name, config.command);

        let mut cmd = Command::new(&config.command);
        if !config.args.is_empty() {
            cmd.args(&config.args);
        }
        for (key, value) in &config.env {
            let expanded = shellexpand::env(value).unwrap_or_else(|_| value.clone().into());
            cmd.env(key, expanded.as_ref());
        }

        // Wrap spawn + initialization in startup timeout
        let service = tokio::time::timeout(startup_timeout, async {
            let transport = TokioChildProcess::new(cmd)?;
            let svc = ().serve(transport).await?;
            Ok::<_, anyhow::Error>(svc)
        })
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "MCP server '{}' startup timed out after {:?}",
                name,
                startup_timeout
            )
        })?
        .with_context(|| format!("Failed to start MCP server '{}'", name))?;

        tracing::info!("Connected to MCP server '{}'", name);

        Ok(Self {
            name: name.to_string(),
            service: Some(service),
            tools_cache: None,
        })
    }

    fn service(&self) -> Result<&RunningService<RoleClient, ()>> {
        self.service
            .as_ref()
            .with_context(|| format!("MCP session '{}' is closed", self.name))
    }
}

#[async_trait]
impl ToolExecutor for McpSession {
    async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        if let Some(tools) = &self.tools_cache {
            return Ok(tools.clone());
        }

        let response = self
            .service()?
            .list_tools(Default::default())
            .await
            .context("Failed to list tools")?;

        let mut tools: Vec<McpTool> = response
            .tools
            .into_iter()
            .map(|t| {
                McpTool::tool(
                    t.name.to_string(),
                    t.description.map(|d| d.to_string()),
                    serde_json::to_value(&t.input_schema).ok(),
                )
            })
            .collect();

        // Resources and prompts are optional server capabilities
        match self.service()?.list_resource_templates(Default::default()).await {
            Ok(listing) => tools.extend(
                listing
                    .resource_templates
                    .iter()
                    .filter_map(|t| serde_json::to_value(t).ok())
                    .filter_map(|t| McpTool::from_resource_template(&t)),
            ),
            Err(e) => tracing::warn!("Server '{}': no resource templates: {}", self.name, e),
        }
        match self.service()?.list_prompts(Default::default()).await {
            Ok(listing) => tools.extend(
                listing
                    .prompts
                    .iter()
                    .filter_map(|p| serde_json::to_value(p).ok())
                    .filter_map(|p| McpTool::from_prompt(&p)),
            ),
            Err(e) => tracing::warn!("Server '{}': no prompts: {}", self.name, e),
        }

        tracing::info!("Server '{}': {} operations (cached)", self.name, tools.len());
        self.tools_cache = Some(tools.clone());
        Ok(tools)
    }

    async fn call_tool(&mut self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        let args = arguments.and_then(|v| v.as_object().cloned());
        self.service()?
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: args,
                task: None,
            })
            .await
            .with_context(|| format!("Failed to call tool: {}", name))
    }

    async fn read_resource(&mut self, uri: &str) -> Result<String> {
        let result = self
            .service()?
            .read_resource(ReadResourceRequestParam { uri: uri.to_string() })
            .await
            .with_context(|| format!("Failed to read resource: {}", uri))?;
        Ok(resource_text(&serde_json::to_value(&result)?))
    }

    async fn get_prompt(&mut self, name: &str, arguments: Option<Value>) -> Result<String> {
        let result = self
            .service()?
            .get_prompt(GetPromptRequestParam {
                name: name.to_string(),
                arguments: prompt_arguments(arguments),
            })
            .await
            .with_context(|| format!("Failed to get prompt: {}", name))?;
        Ok(prompt_text(&serde_json::to_value(&result)?))
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.tools_cache = None;
        if let Some(service) = self.service.take() {
            tracing::debug!("Closing MCP session '{}'", self.name);
            service.cancel().await?;
        }
        Ok(())
    }
}
