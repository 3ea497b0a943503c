//! Result envelopes returned by the introspection and execution operations
//!
//! Every operation answers with one of these instead of raising, so the
//! calling agent always gets data it can reason about.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One result row, keyed by column name
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Maximum number of rows returned by the sample-data resource
pub const SAMPLE_ROW_LIMIT: usize = 5;

/// Column metadata as reported by the database catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Declared type in the engine's textual form
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// Schema of one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableDescriptor {
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
    /// Set only when the catalog itself could not be read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableDescriptor {
    /// Descriptor for a table the catalog does not know, or could not be asked about
    pub fn empty(table: impl Into<String>, error: Option<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            error,
        }
    }
}

/// A few rows plus column names, to show an agent what a table holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SampleDataView {
    pub table: String,
    pub columns: Vec<String>,
    pub sample_rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SampleDataView {
    pub fn failed(table: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            sample_rows: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Outcome of running one SQL statement
///
/// `rows` is present only for row-returning statements and `error` only on
/// failure; the constructors are the only way these are built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryResult {
    pub success: bool,
    /// The SQL text exactly as received
    pub sql: String,
    pub row_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    /// A row-returning statement; `row_count` is the number of rows materialised
    pub fn rows(sql: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            success: true,
            sql: sql.into(),
            row_count: rows.len() as u64,
            rows: Some(rows),
            error: None,
        }
    }

    /// A statement that changed data or schema; `affected` comes from the engine
    pub fn affected(sql: impl Into<String>, affected: u64) -> Self {
        Self {
            success: true,
            sql: sql.into(),
            row_count: affected,
            rows: None,
            error: None,
        }
    }

    pub fn failed(sql: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            sql: sql.into(),
            row_count: 0,
            rows: None,
            error: Some(error.into()),
        }
    }
}

/// Output of the `list_tables` tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableList {
    #[serde(rename = "tableList")]
    pub table_list: Vec<String>,
}
