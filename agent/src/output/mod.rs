//! Output abstraction for the REPL
//!
//! The loop and the agent emit [`OutputEvent`]s; a writer decides how they
//! look. Terminal output is colored, plain output is for pipes and CI.

use std::io::IsTerminal;
use std::time::Duration;

mod plain;
mod terminal;

pub use plain::PlainOutput;
pub use terminal::TerminalOutput;

// ============================================================================
// Output Events
// ============================================================================

/// Events that can be displayed to the user
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Plain text message
    Text(String),

    /// Final answer of an agent call
    Reply(String),

    /// Tool execution started
    ToolStart {
        name: String,
        arguments: serde_json::Value,
    },

    /// Tool execution completed
    ToolComplete {
        name: String,
        result: String,
        duration: Duration,
        is_error: bool,
    },

    /// Status message (informational)
    Status(String),

    /// Error message
    Error(String),

    /// System message (dimmed, for internal info)
    System(String),

    /// New line / separator
    NewLine,
}

// ============================================================================
// Output Writer Trait
// ============================================================================

/// Trait for writing output events
pub trait OutputWriter: Send + Sync {
    /// Write an output event
    fn write(&self, event: OutputEvent);

    /// Flush any buffered output
    fn flush(&self);

    /// Whether this writer supports colors/formatting
    fn supports_colors(&self) -> bool {
        false
    }
}

/// Create a default output writer based on environment
pub fn default_output(verbose: bool) -> Box<dyn OutputWriter> {
    if std::io::stdout().is_terminal() {
        Box::new(TerminalOutput::new().with_verbose(verbose))
    } else {
        Box::new(PlainOutput::new().with_verbose(verbose))
    }
}

/// Shorten `text` to at most `max` characters, marking the cut with `...`
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Compact one-line rendering of tool arguments; empty for `{}` and null
pub(crate) fn format_args(args: &serde_json::Value) -> String {
    match args {
        serde_json::Value::Object(map) if map.is_empty() => String::new(),
        serde_json::Value::Null => String::new(),
        _ => truncate(&args.to_string(), 80),
    }
}

// ============================================================================
// Tests
// ============================================================================
