//! Configuration loading
//!
//! Settings come from an optional `.db-agent.toml`; command-line flags and
//! environment variables override anything it sets.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File name searched for by [`AgentFileConfig::load`]
pub const CONFIG_FILE_NAME: &str = ".db-agent.toml";

/// Default number of LLM round trips per agent call
pub const DEFAULT_MAX_STEPS: usize = 20;

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/db-agent/
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let start = std::env::current_dir().ok()?;
    find_config_file_from(&start, filename).or_else(|| {
        let global_path = dirs::config_dir()?.join("db-agent").join(filename);
        global_path.exists().then_some(global_path)
    })
}

fn find_config_file_from(start: &Path, filename: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.exists())
}

/// How to launch the MCP server
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct McpServerConfig {
    #[serde(default = "default_server_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the child; values may reference `$VARS`
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: default_server_command(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }
}

impl McpServerConfig {
    /// Pass the database URL to the server as `--db-url`
    pub fn with_db_url(mut self, db_url: Option<&str>) -> Self {
        if let Some(url) = db_url {
            self.args.push("--db-url".to_string());
            self.args.push(url.to_string());
        }
        self
    }
}

// ============================================================================
// Agent Configuration (.db-agent.toml)
// ============================================================================

/// Top-level agent configuration
#[derive(Debug, Default, Deserialize)]
pub struct AgentFileConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentSectionConfig,
    #[serde(default)]
    pub server: McpServerConfig,
}

/// LLM configuration section
#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    pub model: Option<String>,
}

/// Agent configuration section
#[derive(Debug, Deserialize)]
pub struct AgentSectionConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    pub system_prompt: Option<String>,
}

// Default value functions
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

fn default_server_command() -> String {
    "db-mcp".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: None,
        }
    }
}

impl Default for AgentSectionConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            system_prompt: None,
        }
    }
}

impl AgentFileConfig {
    /// Load config from .db-agent.toml
    ///
    /// Search order:
    /// 1. Walk up directory tree from cwd looking for .db-agent.toml
    /// 2. Check ~/.config/db-agent/.db-agent.toml (global fallback)
    /// 3. Fall back to defaults
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(CONFIG_FILE_NAME) {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }
}
