//! Error types for the agent

/// Failures of a single agent call
///
/// None of these end the session: the REPL shows the message and waits for
/// the next input.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent did not finish within {max_steps} steps")]
    StepBudgetExceeded { max_steps: usize },

    #[error("could not read a task from the model's reply: {0}")]
    Extraction(String),

    /// LLM transport or MCP session failure
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;
