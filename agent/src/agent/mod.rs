//! Agent module - LLM with tool-calling capabilities
//!
//! This implements the "tool-using agent loop" where:
//! 1. User sends a message
//! 2. LLM receives the message along with available tools
//! 3. LLM decides whether to call tools or respond directly
//! 4. If tools are called, results are fed back to LLM
//! 5. Loop continues until LLM responds without tool calls or the step
//!    budget runs out
//!
//! Resource templates and prompts are offered as tools too; a call to one
//! of them becomes a resource read or a prompt request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::DEFAULT_MAX_STEPS;
use crate::error::{AgentError, AgentResult};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, ToolCall, ToolSpec};
use crate::mcp::{expand_uri_template, OperationKind, ToolExecutor};
use crate::output::{OutputEvent, OutputWriter};
use crate::task::TaskRequest;

pub mod parser;
pub mod tools;

use parser::{parse_content_tool_call, strip_code_fence};
use tools::{clean_schema_for_ollama, mcp_tools_to_specs, render_tool_result};

/// An agent that can use the database tools via MCP
pub struct Agent {
    model: Box<dyn ChatModel>,
    tools: Box<dyn ToolExecutor>,
    system_prompt: Option<String>,
    history: Vec<ChatMessage>,
    max_steps: usize,
    output: Option<Arc<dyn OutputWriter>>,
    operations: HashMap<String, OperationKind>,
}

impl Agent {
    /// Create a new agent
    pub fn new(model: Box<dyn ChatModel>, tools: Box<dyn ToolExecutor>) -> Self {
        Self {
            model,
            tools,
            system_prompt: None,
            history: Vec::new(),
            max_steps: DEFAULT_MAX_STEPS,
            output: None,
            operations: HashMap::new(),
        }
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Bound each call to `max_steps` LLM round trips (at least one)
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Report tool activity to `output`
    pub fn with_output(mut self, output: Arc<dyn OutputWriter>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn model(&self) -> &str {
        self.model.model()
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Completed user/assistant exchanges
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    fn emit(&self, event: OutputEvent) {
        if let Some(output) = &self.output {
            output.write(event);
        }
    }

    /// Send a message and run the tool loop until the model answers
    pub async fn chat(&mut self, user_message: &str) -> AgentResult<String> {
        let total_start = Instant::now();
        let listed = self.tools.list_tools().await?;
        self.operations = listed
            .iter()
            .map(|op| (op.name.clone(), op.kind.clone()))
            .collect();
        let tools = mcp_tools_to_specs(&listed);
        tracing::info!("Agent has {} tools available", tools.len());

        let mut messages: Vec<ChatMessage> = Vec::new();
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(user_message));

        for step in 1..=self.max_steps {
            tracing::debug!("Agent step {}/{}", step, self.max_steps);

            let reply = self.send(&messages, &tools, None).await?;
            let tool_calls = self.tool_calls_of(&reply.tool_calls, &reply.content);

            if tool_calls.is_empty() {
                tracing::info!(
                    "Agent responding without tool calls after {} step(s) in {}ms",
                    step,
                    total_start.elapsed().as_millis()
                );
                self.history.push(ChatMessage::user(user_message));
                self.history.push(ChatMessage::assistant(reply.content.clone()));
                return Ok(reply.content);
            }

            tracing::info!("Agent making {} tool call(s)", tool_calls.len());
            messages.push(ChatMessage {
                tool_calls: Some(tool_calls.clone()),
                ..ChatMessage::assistant(reply.content)
            });

            for tool_call in &tool_calls {
                let result = self.execute(tool_call).await;
                messages.push(ChatMessage::tool(result));
            }
        }

        tracing::warn!("Agent reached max steps ({}), stopping", self.max_steps);
        Err(AgentError::StepBudgetExceeded {
            max_steps: self.max_steps,
        })
    }

    /// Turn a free-form description into a [`TaskRequest`]
    ///
    /// The model is asked for JSON matching the task schema, with the
    /// conversation so far as context. No tools are offered and the exchange
    /// is not kept in the history.
    pub async fn extract_task(&mut self, description: &str) -> AgentResult<TaskRequest> {
        let schema = serde_json::to_value(schemars::schema_for!(TaskRequest))
            .map_err(|e| AgentError::Extraction(e.to_string()))?;

        let mut messages = Vec::new();
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(format!(
            "Analyze a task with the following description: {}",
            description
        )));

        let reply = self
            .send(&messages, &[], Some(clean_schema_for_ollama(&schema)))
            .await?;
        let body = strip_code_fence(&reply.content);
        tracing::debug!("Extraction reply: {}", body);

        serde_json::from_str(body).map_err(|e| AgentError::Extraction(e.to_string()))
    }

    /// Close the tool connection
    pub async fn shutdown(&mut self) -> AgentResult<()> {
        self.tools.shutdown().await?;
        Ok(())
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        format: Option<serde_json::Value>,
    ) -> AgentResult<crate::llm::AssistantReply> {
        tracing::debug!(
            "LLM request: model={} messages={} tools={}",
            self.model.model(),
            messages.len(),
            tools.len()
        );
        let reply = self
            .model
            .chat(ChatRequest {
                messages: messages.to_vec(),
                tools: tools.to_vec(),
                format,
            })
            .await?;
        tracing::debug!(
            "LLM reply: {} chars, {} tool call(s)",
            reply.content.len(),
            reply.tool_calls.len()
        );
        Ok(reply)
    }

    /// Native tool calls, or one parsed out of the content as a fallback
    fn tool_calls_of(&self, native: &[ToolCall], content: &str) -> Vec<ToolCall> {
        if !native.is_empty() {
            return native.to_vec();
        }
        match parse_content_tool_call(content) {
            Some(call) => {
                tracing::info!("Parsed tool call from content: {}", call.function.name);
                vec![call]
            }
            None => Vec::new(),
        }
    }

    /// Run one tool call; failures become text for the model
    async fn execute(&mut self, tool_call: &ToolCall) -> String {
        let kind = self
            .operations
            .get(&tool_call.function.name)
            .cloned()
            .unwrap_or(OperationKind::Tool);
        let name = tool_call.function.name.clone();
        let arguments = tool_call.function.arguments.clone();
        self.emit(OutputEvent::ToolStart {
            name: name.clone(),
            arguments: arguments.clone(),
        });

        let arguments = match arguments {
            serde_json::Value::Null => None,
            other => Some(other),
        };

        let started = Instant::now();
        let outcome = match kind {
            OperationKind::Tool => self
                .tools
                .call_tool(&name, arguments)
                .await
                .map(|result| (render_tool_result(&result), result.is_error == Some(true))),
            OperationKind::Resource { uri_template } => {
                let arguments = arguments.unwrap_or_default();
                match expand_uri_template(&uri_template, &arguments) {
                    Ok(uri) => {
                        tracing::debug!("Reading resource {}", uri);
                        self.tools.read_resource(&uri).await.map(|text| (text, false))
                    }
                    Err(e) => Err(e),
                }
            }
            OperationKind::Prompt => self
                .tools
                .get_prompt(&name, arguments)
                .await
                .map(|text| (text, false)),
        };

        let (result, is_error) = match outcome {
            Ok(done) => done,
            Err(e) => {
                tracing::warn!("Tool {} failed: {:#}", name, e);
                (format!("Error calling tool {}: {}", name, e), true)
            }
        };

        self.emit(OutputEvent::ToolComplete {
            name,
            result: result.clone(),
            duration: started.elapsed(),
            is_error,
        });
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::AssistantReply;
    use crate::mcp::McpTool;
    use crate::output::tests::RecordingOutput;
    use anyhow::Result;
    use async_trait::async_trait;
    use rmcp::model::CallToolResult;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Chat model replaying canned replies and recording requests
    #[derive(Default, Clone)]
    pub(crate) struct ScriptedModel {
        replies: Arc<Mutex<VecDeque<AssistantReply>>>,
        pub requests: Arc<Mutex<Vec<ChatRequest>>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<AssistantReply>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                requests: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(&self, request: ChatRequest) -> Result<AssistantReply> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    pub(crate) fn text(content: &str) -> AssistantReply {
        AssistantReply {
            content: content.to_string(),
            tool_calls: Vec::new(),
        }
    }

    pub(crate) fn calls(name: &str, arguments: Value) -> AssistantReply {
        AssistantReply {
            content: String::new(),
            tool_calls: vec![ToolCall::new(name, arguments)],
        }
    }

    /// Tool executor answering from a fixed table
    #[derive(Default, Clone)]
    pub(crate) struct FakeTools {
        pub calls: Arc<Mutex<Vec<(String, Option<Value>)>>>,
        pub reads: Arc<Mutex<Vec<String>>>,
        pub shut_down: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl ToolExecutor for FakeTools {
        async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
            Ok(vec![
                McpTool::tool(
                    "list_tables",
                    Some("List tables".into()),
                    Some(json!({"type": "object", "properties": {}})),
                ),
                McpTool::tool("run_sql", Some("Run SQL".into()), None),
                McpTool::from_resource_template(&json!({
                    "uriTemplate": "db://metadata/{table_name}",
                    "name": "describe_table"
                }))
                .unwrap(),
                McpTool::from_prompt(&json!({
                    "name": "handle_query_error",
                    "arguments": [{"name": "error_message", "required": true}]
                }))
                .unwrap(),
            ])
        }

        async fn call_tool(&mut self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
            self.calls.lock().unwrap().push((name.to_string(), arguments));
            match name {
                "list_tables" => Ok(CallToolResult::structured(json!({"tableList": ["books"]}))),
                other => Err(anyhow::anyhow!("unknown tool {}", other)),
            }
        }

        async fn read_resource(&mut self, uri: &str) -> Result<String> {
            self.reads.lock().unwrap().push(uri.to_string());
            Ok(format!("{{\"uri\":\"{}\"}}", uri))
        }

        async fn get_prompt(&mut self, name: &str, arguments: Option<Value>) -> Result<String> {
            self.calls.lock().unwrap().push((name.to_string(), arguments));
            Ok("Check the table name.".to_string())
        }

        async fn shutdown(&mut self) -> Result<()> {
            *self.shut_down.lock().unwrap() = true;
            Ok(())
        }
    }

    fn agent(model: &ScriptedModel, tools: &FakeTools) -> Agent {
        Agent::new(Box::new(model.clone()), Box::new(tools.clone()))
    }

    #[tokio::test]
    async fn test_tool_loop_feeds_results_back() {
        let model = ScriptedModel::new(vec![
            calls("list_tables", json!({})),
            text("There is one table: books."),
        ]);
        let tools = FakeTools::default();
        let output = RecordingOutput::default();
        let mut agent = agent(&model, &tools)
            .with_system_prompt("be brief")
            .with_output(Arc::new(output.clone()));

        let answer = agent.chat("what tables exist?").await.unwrap();
        assert_eq!(answer, "There is one table: books.");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].tools.len(), 4);
        let second = &requests[1].messages;
        assert_eq!(second[0], ChatMessage::system("be brief"));
        assert_eq!(second.last().unwrap().content, r#"{"tableList":["books"]}"#);

        assert_eq!(agent.history().len(), 2);
        assert!(matches!(
            output.events()[0],
            OutputEvent::ToolStart { ref name, .. } if name == "list_tables"
        ));
    }

    #[tokio::test]
    async fn test_history_carries_into_next_call() {
        let model = ScriptedModel::new(vec![text("first"), text("second")]);
        let tools = FakeTools::default();
        let mut agent = agent(&model, &tools);

        agent.chat("one").await.unwrap();
        agent.chat("two").await.unwrap();

        let requests = model.requests.lock().unwrap();
        let contents: Vec<_> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "first", "two"]);
    }

    #[tokio::test]
    async fn test_step_budget_exceeded() {
        let model = ScriptedModel::new(vec![
            calls("list_tables", json!({})),
            calls("list_tables", json!({})),
            calls("list_tables", json!({})),
        ]);
        let tools = FakeTools::default();
        let mut agent = agent(&model, &tools).with_max_steps(2);

        let err = agent.chat("loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::StepBudgetExceeded { max_steps: 2 }));
        assert_eq!(model.requests.lock().unwrap().len(), 2);
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_tool_error_becomes_message() {
        let model = ScriptedModel::new(vec![
            calls("drop_everything", json!({"force": true})),
            text("I could not do that."),
        ]);
        let tools = FakeTools::default();
        let mut agent = agent(&model, &tools);

        agent.chat("drop it").await.unwrap();
        let requests = model.requests.lock().unwrap();
        let tool_message = requests[1].messages.last().unwrap();
        assert!(tool_message
            .content
            .starts_with("Error calling tool drop_everything:"));
    }

    #[tokio::test]
    async fn test_tool_call_in_content_is_executed() {
        let model = ScriptedModel::new(vec![
            text(r#"{"name": "list_tables", "arguments": {}}"#),
            text("books"),
        ]);
        let tools = FakeTools::default();
        let mut agent = agent(&model, &tools);

        assert_eq!(agent.chat("tables?").await.unwrap(), "books");
        assert_eq!(tools.calls.lock().unwrap()[0].0, "list_tables");
    }

    #[tokio::test]
    async fn test_extract_task() {
        let model = ScriptedModel::new(vec![text(
            "```json\n{\"task_type\": \"report\", \"description\": \"send weekly report\"}\n```",
        )]);
        let tools = FakeTools::default();
        let mut agent = agent(&model, &tools);

        let task = agent.extract_task("send weekly report").await.unwrap();
        assert_eq!(task.task_type.as_deref(), Some("report"));
        assert!(task.priority.is_none());

        let requests = model.requests.lock().unwrap();
        assert!(requests[0].tools.is_empty());
        let format = requests[0].format.as_ref().unwrap();
        assert!(format["properties"].get("priority").is_some());
        assert!(format.get("$schema").is_none());
        assert!(requests[0].messages[0]
            .content
            .ends_with("description: send weekly report"));
        assert!(agent.history().is_empty());
        assert!(tools.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extract_task_rejects_non_json() {
        let model = ScriptedModel::new(vec![text("Sure! It's a report task.")]);
        let tools = FakeTools::default();
        let mut agent = agent(&model, &tools);

        let err = agent.extract_task("send weekly report").await.unwrap_err();
        assert!(matches!(err, AgentError::Extraction(_)));
    }

    #[tokio::test]
    async fn test_extract_task_sees_history() {
        let model = ScriptedModel::new(vec![
            text("We have a books table."),
            text(r#"{"description": "count the books"}"#),
        ]);
        let tools = FakeTools::default();
        let mut agent = agent(&model, &tools);

        agent.chat("what data do we have?").await.unwrap();
        agent.extract_task("count them").await.unwrap();

        let requests = model.requests.lock().unwrap();
        let contents: Vec<_> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[..2], ["what data do we have?", "We have a books table."]);
        assert!(contents[2].ends_with("description: count them"));
        assert_eq!(agent.history().len(), 2);
    }

    #[tokio::test]
    async fn test_resource_template_call_reads_resource() {
        let model = ScriptedModel::new(vec![
            calls("describe_table", json!({"table_name": "books"})),
            text("books has an id column."),
        ]);
        let tools = FakeTools::default();
        let mut agent = agent(&model, &tools);

        agent.chat("describe books").await.unwrap();
        assert_eq!(*tools.reads.lock().unwrap(), vec!["db://metadata/books"]);
        assert!(tools.calls.lock().unwrap().is_empty());

        let requests = model.requests.lock().unwrap();
        assert_eq!(
            requests[1].messages.last().unwrap().content,
            r#"{"uri":"db://metadata/books"}"#
        );
    }

    #[tokio::test]
    async fn test_resource_call_without_arguments_is_an_error() {
        let model = ScriptedModel::new(vec![calls("describe_table", Value::Null), text("sorry")]);
        let tools = FakeTools::default();
        let mut agent = agent(&model, &tools);

        agent.chat("describe").await.unwrap();
        assert!(tools.reads.lock().unwrap().is_empty());
        let requests = model.requests.lock().unwrap();
        assert!(requests[1]
            .messages
            .last()
            .unwrap()
            .content
            .contains("missing argument 'table_name'"));
    }

    #[tokio::test]
    async fn test_prompt_call_gets_prompt() {
        let model = ScriptedModel::new(vec![
            calls("handle_query_error", json!({"error_message": "no such table: bok"})),
            text("Did you mean books?"),
        ]);
        let tools = FakeTools::default();
        let mut agent = agent(&model, &tools);

        agent.chat("fix my query").await.unwrap();
        let recorded = tools.calls.lock().unwrap();
        assert_eq!(recorded[0].0, "handle_query_error");
        assert_eq!(recorded[0].1, Some(json!({"error_message": "no such table: bok"})));

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[1].messages.last().unwrap().content, "Check the table name.");
    }

    #[tokio::test]
    async fn test_shutdown_closes_tools() {
        let model = ScriptedModel::default();
        let tools = FakeTools::default();
        let mut agent = agent(&model, &tools);

        agent.shutdown().await.unwrap();
        assert!(*tools.shut_down.lock().unwrap());
    }
}
