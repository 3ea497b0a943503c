//! Database MCP Server
//!
//! Serves table introspection, SQL execution and query-error recovery for
//! the database named by `--db-url` / `DB_URL` over stdio.

use clap::Parser;
use db_mcp::{DbConfig, DbContext, DbMcpServer, DEFAULT_MAX_CONNECTIONS};

#[derive(Parser, Debug)]
#[command(name = "db-mcp")]
#[command(about = "MCP server for relational database access")]
#[command(version)]
struct Args {
    /// Database connection string (postgres://... or sqlite://...)
    #[arg(long, env = "DB_URL")]
    db_url: Option<String>,

    /// Maximum number of pooled connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mcp_common::init_tracing("db_mcp")?;
    let args = Args::parse();

    let config = DbConfig::new(args.db_url, args.max_connections)?;
    let ctx = DbContext::connect(&config).await?;
    let server = DbMcpServer::new(ctx)?;

    let result = mcp_common::serve_stdio(server.clone(), "db_mcp").await;
    server.close().await;
    result
}
