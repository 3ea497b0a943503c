//! Recovery guidance after a failed query
//!
//! A fixed template, not a model call: it lays out the next moves
//! (introspect, then retry) and leaves the choice to the caller.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Speaker of a guidance message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
}

/// One message of the recovery conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GuidanceMessage {
    pub role: MessageRole,
    pub text: String,
}

/// Steps offered after a failure, in the order they should be tried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStep<'a> {
    ListTables,
    DescribeTable(Option<&'a str>),
    RetryQuery,
}

impl RecoveryStep<'_> {
    fn render(&self) -> String {
        match self {
            RecoveryStep::ListTables => {
                "Call list_tables() to check available tables.".to_string()
            }
            RecoveryStep::DescribeTable(Some(table)) => format!(
                "Read db://metadata/{} (describe_table) to inspect the schema of table '{}'.",
                table, table
            ),
            RecoveryStep::DescribeTable(None) => {
                "Read db://metadata/{table_name} (describe_table) to inspect the schema of the target table."
                    .to_string()
            }
            RecoveryStep::RetryQuery => {
                "Once you have the correct schema/columns, craft a corrected SQL and call run_sql()."
                    .to_string()
            }
        }
    }
}

/// Build the guidance shown after `sql_query` failed with `error_message`
///
/// The query and error are embedded verbatim; identical inputs always give
/// identical output.
pub fn build_recovery_guidance(
    error_message: &str,
    table_name: Option<&str>,
    sql_query: Option<&str>,
) -> Vec<GuidanceMessage> {
    let steps = [
        RecoveryStep::ListTables,
        RecoveryStep::DescribeTable(table_name),
        RecoveryStep::RetryQuery,
    ];

    let mut text = format!(
        "You attempted to run this SQL query:\n{}\n\nIt failed with the error:\n{}\n\nHere are your options:\n",
        sql_query.unwrap_or("(query not provided)"),
        error_message
    );
    for (i, step) in steps.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, step.render()));
    }
    text.push_str("Which step will you take?");

    vec![GuidanceMessage {
        role: MessageRole::User,
        text,
    }]
}
