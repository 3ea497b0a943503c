//! CLI argument definitions

use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(name = "db-agent")]
#[command(about = "Chat with a database through an MCP server, with task confirmation")]
pub struct Cli {
    /// Ollama server URL (default: from .db-agent.toml or http://localhost:11434)
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Model to use (required: must be specified in .db-agent.toml or via -m flag)
    #[arg(short = 'm', long, env = "OLLAMA_MODEL")]
    pub model: Option<String>,

    /// Database URL handed to the MCP server as --db-url
    #[arg(long, env = "DB_URL")]
    pub db_url: Option<String>,

    /// Command that starts the MCP server (default: db-mcp)
    #[arg(long)]
    pub server_command: Option<String>,

    /// Maximum LLM round trips per agent call
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// System prompt for the agent
    #[arg(long, short)]
    pub system: Option<String>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
