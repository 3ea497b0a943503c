use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use db_agent::cli::{Cli, StdinConsole};
use db_agent::config::AgentFileConfig;
use db_agent::output::{default_output, OutputWriter};
use db_agent::session::{ClientSession, SessionSettings};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Default to warn; RUST_LOG wins when set
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let settings = SessionSettings::resolve(&cli, AgentFileConfig::load()?)?;
    let output: Arc<dyn OutputWriter> = Arc::from(default_output(cli.verbose > 0));

    let session = ClientSession::open(&settings, output.clone()).await?;
    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await
        }
    };
    session
        .run_until(StdinConsole::new(), output, interrupted)
        .await
}
