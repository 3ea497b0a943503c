//! End-to-end tests of the MCP surface
//!
//! A real rmcp client talks to the server over an in-process duplex pipe,
//! backed by a temporary SQLite database.

use db_mcp::{DbConfig, DbContext, DbMcpServer};
use rmcp::{
    model::{CallToolRequestParam, GetPromptRequestParam, ReadResourceRequestParam},
    service::RunningService,
    RoleClient, ServiceExt,
};
use serde_json::{json, Value};
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    client: RunningService<RoleClient, ()>,
}

async fn start() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("shop.db").display());
    let ctx = DbContext::connect(&DbConfig::new(Some(url), 2).unwrap())
        .await
        .unwrap();

    for statement in [
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, email TEXT NOT NULL, created_at TEXT DEFAULT CURRENT_TIMESTAMP)",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER, total REAL)",
        "INSERT INTO customers (id, email) VALUES (1, 'a@example.com'), (2, 'b@example.com')",
        "INSERT INTO orders (id, customer_id, total) VALUES (1, 1, 12.5), (2, 1, 3.0), (3, 2, 40.0)",
    ] {
        ctx.backend().execute(statement).await.unwrap();
    }

    let server = DbMcpServer::new(ctx).unwrap();
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    tokio::spawn(async move {
        if let Ok(service) = server.serve(server_io).await {
            let _ = service.waiting().await;
        }
    });

    let client = ().serve(client_io).await.unwrap();
    Harness { _dir: dir, client }
}

async fn call(harness: &Harness, name: &str, arguments: Value) -> Value {
    let result = harness
        .client
        .call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        })
        .await
        .unwrap();
    result.structured_content.unwrap()
}

#[tokio::test]
async fn lists_all_operations() {
    let harness = start().await;

    let tools = harness.client.list_tools(Default::default()).await.unwrap();
    let mut names: Vec<_> = tools.tools.iter().map(|t| t.name.to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["list_tables", "run_sql"]);

    let templates = harness
        .client
        .list_resource_templates(Default::default())
        .await
        .unwrap();
    let uris: Vec<_> = templates
        .resource_templates
        .iter()
        .map(|t| t.raw.uri_template.clone())
        .collect();
    assert!(uris.contains(&"db://sample-data/{table_name}".to_string()));
    assert!(uris.contains(&"db://metadata/{table_name}".to_string()));

    let prompts = harness.client.list_prompts(Default::default()).await.unwrap();
    assert_eq!(prompts.prompts.len(), 1);
    assert_eq!(prompts.prompts[0].name, "handle_query_error");

    harness.client.cancel().await.unwrap();
}

#[tokio::test]
async fn list_tables_returns_table_list() {
    let harness = start().await;
    let output = call(&harness, "list_tables", json!({})).await;
    assert_eq!(output, json!({"tableList": ["customers", "orders"]}));
    harness.client.cancel().await.unwrap();
}

#[tokio::test]
async fn run_sql_select_and_update() {
    let harness = start().await;

    let output = call(
        &harness,
        "run_sql",
        json!({"sql_query": "SELECT customer_id, SUM(total) AS spent FROM orders GROUP BY customer_id ORDER BY customer_id"}),
    )
    .await;
    assert_eq!(output["success"], true);
    assert_eq!(output["row_count"], 2);
    assert_eq!(output["rows"][0], json!({"customer_id": 1, "spent": 15.5}));

    let output = call(
        &harness,
        "run_sql",
        json!({"sql_query": "DELETE FROM orders WHERE total < 10"}),
    )
    .await;
    assert_eq!(output["success"], true);
    assert_eq!(output["row_count"], 1);
    assert!(output.get("rows").map_or(true, Value::is_null));

    harness.client.cancel().await.unwrap();
}

#[tokio::test]
async fn failed_query_then_recovery_prompt() {
    let harness = start().await;
    let sql = "SELECT * FROM order_items";

    let output = call(&harness, "run_sql", json!({"sql_query": sql})).await;
    assert_eq!(output["success"], false);
    assert_eq!(output["sql"], sql);
    let error = output["error"].as_str().unwrap().to_string();
    assert!(error.contains("order_items"));

    let prompt = harness
        .client
        .get_prompt(GetPromptRequestParam {
            name: "handle_query_error".to_string(),
            arguments: json!({"error_message": error, "sql_query": sql})
                .as_object()
                .cloned(),
        })
        .await
        .unwrap();
    let rendered = serde_json::to_value(&prompt.messages[0]).unwrap();
    let text = rendered["content"]["text"].as_str().unwrap();
    assert!(text.contains(sql));
    assert!(text.contains("list_tables()"));

    harness.client.cancel().await.unwrap();
}

#[tokio::test]
async fn metadata_and_sample_resources() {
    let harness = start().await;

    let metadata = harness
        .client
        .read_resource(ReadResourceRequestParam {
            uri: "db://metadata/customers".to_string(),
        })
        .await
        .unwrap();
    let contents = serde_json::to_value(&metadata.contents[0]).unwrap();
    assert_eq!(contents["mimeType"], "application/json");
    let body: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(body["columns"][1], json!({"name": "email", "type": "TEXT", "nullable": false, "default": null}));
    assert_eq!(body["columns"][2]["default"], "CURRENT_TIMESTAMP");

    let sample = harness
        .client
        .read_resource(ReadResourceRequestParam {
            uri: "db://sample-data/orders".to_string(),
        })
        .await
        .unwrap();
    let contents = serde_json::to_value(&sample.contents[0]).unwrap();
    let body: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(body["columns"], json!(["id", "customer_id", "total"]));
    assert_eq!(body["sample_rows"].as_array().unwrap().len(), 3);

    harness.client.cancel().await.unwrap();
}

#[tokio::test]
async fn invalid_calls_are_protocol_errors() {
    let harness = start().await;

    let unknown = harness
        .client
        .call_tool(CallToolRequestParam {
            name: "drop_database".into(),
            arguments: None,
            task: None,
        })
        .await;
    assert!(unknown.is_err());

    let malformed = harness
        .client
        .call_tool(CallToolRequestParam {
            name: "run_sql".into(),
            arguments: json!({"query": "SELECT 1"}).as_object().cloned(),
            task: None,
        })
        .await;
    assert!(malformed.is_err());

    let unmatched = harness
        .client
        .read_resource(ReadResourceRequestParam {
            uri: "db://tables/customers".to_string(),
        })
        .await;
    assert!(unmatched.is_err());

    harness.client.cancel().await.unwrap();
}
