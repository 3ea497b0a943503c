//! Structured task requests extracted from free-form descriptions

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Priority shown when the model did not pick one
pub const DEFAULT_PRIORITY: &str = "low";

/// A task as understood by the model
///
/// Every field is optional; the model may leave any of them out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskRequest {
    /// The type of task to perform
    #[serde(default)]
    pub task_type: Option<String>,
    /// Detailed description of the task
    #[serde(default)]
    pub description: Option<String>,
    /// Priority level: low, medium, high
    #[serde(default)]
    pub priority: Option<String>,
}

impl TaskRequest {
    /// Priority for display; absent means [`DEFAULT_PRIORITY`]
    pub fn display_priority(&self) -> &str {
        self.priority.as_deref().unwrap_or(DEFAULT_PRIORITY)
    }

    /// Lines shown to the user before asking for confirmation
    pub fn summary(&self) -> Vec<String> {
        vec![
            format!("• Type: {}", self.task_type.as_deref().unwrap_or("-")),
            format!("• Description: {}", self.description.as_deref().unwrap_or("-")),
            format!("• Priority: {}", self.display_priority()),
        ]
    }
}
