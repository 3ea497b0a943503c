//! Ollama backend using direct HTTP calls to `/api/chat`

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{AssistantReply, ChatMessage, ChatModel, ChatRequest, ToolSpec};

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolSpec],
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a serde_json::Value>,
    stream: bool,
}

fn no_tools(tools: &&[ToolSpec]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: AssistantReply,
}

/// Chat client for an Ollama server
pub struct OllamaChat {
    base_url: Url,
    endpoint: Url,
    http_client: reqwest::Client,
    model: String,
}

impl OllamaChat {
    /// Create a client for `model` served at `url` (e.g. `http://localhost:11434`)
    ///
    /// Scheme, port and any path prefix are kept as given; the chat endpoint
    /// is `api/chat` below the base.
    pub fn new(url: &str, model: &str) -> Result<Self> {
        let mut base_url = Url::parse(url).with_context(|| format!("Invalid Ollama URL: {}", url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid Ollama URL: {}", url);
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let endpoint = base_url
            .join("api/chat")
            .with_context(|| format!("Invalid Ollama URL: {}", url))?;

        Ok(Self {
            base_url,
            endpoint,
            http_client: reqwest::Client::new(),
            model: model.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn chat(&self, request: ChatRequest) -> Result<AssistantReply> {
        let body = OllamaChatRequest {
            model: &self.model,
            messages: &request.messages,
            tools: &request.tools,
            format: request.format.as_ref(),
            stream: false,
        };

        tracing::debug!(
            "Ollama request: model={} messages={} tools={}",
            self.model,
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .context("Failed to send HTTP request to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Ollama API error {}: {}", status, body));
        }

        let raw_body = response.text().await.context("Failed to get response text")?;
        let parsed: OllamaChatResponse =
            serde_json::from_str(&raw_body).context("Failed to parse Ollama response")?;

        tracing::debug!(
            "Ollama response: {} chars, {} tool calls",
            parsed.message.content.len(),
            parsed.message.tool_calls.len()
        );
        Ok(parsed.message)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
