//! Client session setup and release
//!
//! Settings are merged from the config file and the command line, then a
//! single MCP connection and LLM client are opened for the whole REPL run.
//! [`ClientSession::run_until`] drives the REPL and releases the connection
//! however the run ends.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::agent::Agent;
use crate::cli::{Cli, Console, Repl};
use crate::config::{AgentFileConfig, McpServerConfig};
use crate::llm::OllamaChat;
use crate::mcp::McpSession;
use crate::output::{OutputEvent, OutputWriter};

/// Name the MCP connection is logged under
pub const SERVER_NAME: &str = "db";

/// Effective settings after CLI/env overrides
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub ollama_url: String,
    pub model: String,
    pub max_steps: usize,
    pub system_prompt: Option<String>,
    pub server: McpServerConfig,
}

impl SessionSettings {
    /// Merge `cli` over `file`; a model must come from one of them
    pub fn resolve(cli: &Cli, file: AgentFileConfig) -> Result<Self> {
        let model = cli.model.clone().or(file.llm.model).context(
            "No model specified. Set it in .db-agent.toml under [llm] or use --model / OLLAMA_MODEL",
        )?;

        let mut server = file.server;
        if let Some(command) = &cli.server_command {
            server.command = command.clone();
        }

        Ok(Self {
            ollama_url: cli.ollama_url.clone().unwrap_or(file.llm.url),
            model,
            max_steps: cli.max_steps.unwrap_or(file.agent.max_steps),
            system_prompt: cli.system.clone().or(file.agent.system_prompt),
            server: server.with_db_url(cli.db_url.as_deref()),
        })
    }
}

/// The agent plus the connection it owns
pub struct ClientSession {
    agent: Agent,
}

impl ClientSession {
    /// Spawn the MCP server and build the agent around it
    pub async fn open(settings: &SessionSettings, output: Arc<dyn OutputWriter>) -> Result<Self> {
        let chat = OllamaChat::new(&settings.ollama_url, &settings.model)?;
        tracing::info!("Using model {} at {}", settings.model, chat.base_url());

        let session = McpSession::connect(SERVER_NAME, &settings.server)
            .await
            .with_context(|| format!("Failed to start MCP server '{}'", settings.server.command))?;

        let mut agent = Agent::new(Box::new(chat), Box::new(session))
            .with_max_steps(settings.max_steps)
            .with_output(output);
        if let Some(prompt) = &settings.system_prompt {
            agent = agent.with_system_prompt(prompt.clone());
        }

        Ok(Self::from_agent(agent))
    }

    pub fn from_agent(agent: Agent) -> Self {
        Self { agent }
    }

    /// Run the REPL on `console` until it exits or `shutdown` completes
    ///
    /// The session is released in every case, including console errors.
    pub async fn run_until<C, F>(
        mut self,
        console: C,
        output: Arc<dyn OutputWriter>,
        shutdown: F,
    ) -> Result<()>
    where
        C: Console,
        F: Future<Output = ()>,
    {
        let result = {
            let mut repl = Repl::new(&mut self.agent, console, output.clone());
            tokio::select! {
                result = repl.run() => result,
                _ = shutdown => {
                    tracing::info!("Interrupted, shutting down");
                    output.write(OutputEvent::NewLine);
                    output.write(OutputEvent::Text("Goodbye!".to_string()));
                    Ok(())
                }
            }
        };

        self.release().await;
        result
    }

    /// Close the MCP connection; failures are logged, not returned
    pub async fn release(mut self) {
        match self.agent.shutdown().await {
            Ok(()) => tracing::info!("Session released"),
            Err(e) => tracing::warn!("Error while releasing session: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::{FakeTools, ScriptedModel};
    use crate::llm::{AssistantReply, ChatModel, ChatRequest};
    use crate::output::tests::RecordingOutput;
    use async_trait::async_trait;
    use clap::Parser;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["db-agent"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_model_is_required() {
        let err = SessionSettings::resolve(&cli(&[]), AgentFileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("No model specified"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = AgentFileConfig::default();
        file.llm.model = Some("from-file".into());
        file.agent.max_steps = 7;
        file.agent.system_prompt = Some("file prompt".into());

        let settings = SessionSettings::resolve(
            &cli(&["-m", "from-cli", "--server-command", "./db-mcp", "--db-url", "sqlite://a.db"]),
            file,
        )
        .unwrap();

        assert_eq!(settings.model, "from-cli");
        assert_eq!(settings.max_steps, 7);
        assert_eq!(settings.system_prompt.as_deref(), Some("file prompt"));
        assert_eq!(settings.server.command, "./db-mcp");
        assert_eq!(settings.server.args, vec!["--db-url", "sqlite://a.db"]);
        assert_eq!(settings.ollama_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_release_shuts_down_tools() {
        let tools = FakeTools::default();
        let agent = Agent::new(Box::new(ScriptedModel::default()), Box::new(tools.clone()));
        ClientSession::from_agent(agent).release().await;
        assert!(*tools.shut_down.lock().unwrap());
    }

    /// Console that yields its lines, then waits forever or fails
    struct FakeConsole {
        lines: VecDeque<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl Console for FakeConsole {
        async fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
            if let Some(line) = self.lines.pop_front() {
                return Ok(Some(line.to_string()));
            }
            if self.fail {
                anyhow::bail!("Failed to read from stdin");
            }
            std::future::pending().await
        }
    }

    /// Model that never answers
    #[derive(Clone, Default)]
    struct StalledModel {
        called: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl ChatModel for StalledModel {
        async fn chat(&self, _request: ChatRequest) -> Result<AssistantReply> {
            *self.called.lock().unwrap() = true;
            std::future::pending().await
        }

        fn model(&self) -> &str {
            "stalled"
        }
    }

    fn interrupt_after(ms: u64) -> impl Future<Output = ()> {
        tokio::time::sleep(Duration::from_millis(ms))
    }

    #[tokio::test]
    async fn test_interrupt_while_reading_releases_session() {
        let tools = FakeTools::default();
        let output = RecordingOutput::default();
        let agent = Agent::new(Box::new(ScriptedModel::default()), Box::new(tools.clone()));
        let console = FakeConsole {
            lines: VecDeque::new(),
            fail: false,
        };

        ClientSession::from_agent(agent)
            .run_until(console, Arc::new(output.clone()), interrupt_after(20))
            .await
            .unwrap();

        assert!(*tools.shut_down.lock().unwrap());
        assert_eq!(output.texts().last().map(String::as_str), Some("Goodbye!"));
    }

    #[tokio::test]
    async fn test_interrupt_during_agent_call_releases_session() {
        let tools = FakeTools::default();
        let model = StalledModel::default();
        let agent = Agent::new(Box::new(model.clone()), Box::new(tools.clone()));
        let console = FakeConsole {
            lines: vec!["how many books?"].into(),
            fail: false,
        };

        ClientSession::from_agent(agent)
            .run_until(console, Arc::new(RecordingOutput::default()), interrupt_after(20))
            .await
            .unwrap();

        assert!(*model.called.lock().unwrap());
        assert!(*tools.shut_down.lock().unwrap());
    }

    #[tokio::test]
    async fn test_console_error_releases_session() {
        let tools = FakeTools::default();
        let agent = Agent::new(Box::new(ScriptedModel::default()), Box::new(tools.clone()));
        let console = FakeConsole {
            lines: VecDeque::new(),
            fail: true,
        };

        let err = ClientSession::from_agent(agent)
            .run_until(
                console,
                Arc::new(RecordingOutput::default()),
                std::future::pending::<()>(),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to read from stdin"));
        assert!(*tools.shut_down.lock().unwrap());
    }
}
