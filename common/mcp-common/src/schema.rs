//! JSON schema helpers
//!
//! MCP tool listings carry input/output schemas as JSON objects. These are
//! generated from the same `schemars`-annotated types the handlers
//! deserialize into, so the advertised contract and the checked contract
//! cannot drift apart.

use rmcp::model::JsonObject;
use schemars::JsonSchema;

/// Failure to turn a Rust type into an MCP schema object
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The generated schema was not a JSON object (e.g. a bare `true` schema)
    #[error("schema for {0} is not a JSON object")]
    NotAnObject(&'static str),

    #[error("failed to serialize schema: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Generate the JSON schema object for `T`
///
/// ```rust,ignore
/// let input_schema = mcp_common::schema_object::<RunSqlParams>()?;
/// ```
pub fn schema_object<T: JsonSchema>() -> Result<JsonObject, SchemaError> {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(&schema)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(SchemaError::NotAnObject(std::any::type_name::<T>())),
    }
}
