//! Database agent: an Ollama model driving the db-mcp server
//!
//! The REPL in [`cli::repl`] sits on top of an [`agent::Agent`] that calls
//! MCP tools through one long-lived [`mcp::McpSession`].

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod output;
pub mod session;
pub mod task;

pub use agent::Agent;
pub use error::{AgentError, AgentResult};
pub use session::{ClientSession, SessionSettings};
pub use task::TaskRequest;
