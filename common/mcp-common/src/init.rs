//! Server initialization utilities
//!
//! Provides standardized tracing setup and [`serve_stdio`] for consistent
//! MCP server startup across servers.

use rmcp::{ServerHandler, ServiceExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging for MCP servers
///
/// Sets up logging to stderr (stdout is reserved for MCP protocol) with:
/// - Formatted output without ANSI colors (for clean logs)
/// - Environment-based filtering via RUST_LOG
/// - Default log level of `info` for the specified crate
///
/// Set `LOG_FORMAT=json` for structured JSON output (useful for production/log aggregation).
/// Default is human-readable text output.
///
/// # Arguments
///
/// * `crate_name` - The name of the MCP server crate (e.g., "db_mcp")
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let directive = format!("{}=info", crate_name);
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

/// Serve an already-constructed MCP server over stdio until the peer disconnects
///
/// Servers that need configuration (database pools, credentials) are built by
/// their `main` first and then handed over here, so startup failures surface
/// before the transport is opened.
///
/// # Example
///
/// ```rust,ignore
/// mcp_common::init_tracing("my_mcp")?;
/// let server = MyServer::connect(&config).await?;
/// mcp_common::serve_stdio(server, "my_mcp").await?;
/// ```
pub async fn serve_stdio<S>(server: S, name: &str) -> anyhow::Result<()>
where
    S: ServerHandler,
{
    tracing::info!("Starting {} MCP Server", name);

    let service = server.serve(rmcp::transport::stdio()).await?;

    tracing::info!("Server running, waiting for requests...");

    service.waiting().await?;

    tracing::info!("Server shutting down");
    Ok(())
}

