//! `toolchat-tools`: the tool server process.
//!
//! Speaks the tool protocol on stdin/stdout; logs go to stderr. Reads
//! `WEATHER_API` from the environment or a `.env` file.

use anyhow::Result;
use tracing::info;

use toolchat_mcp::{serve, ServerInfo};
use toolchat_tools::weather::WeatherTool;
use toolchat_tools::{build_registry, ToolServer};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    init_logging();
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    let server = ToolServer::new(
        ServerInfo::new("toolchat-tools", env!("CARGO_PKG_VERSION")),
        build_registry(WeatherTool::from_env()),
    );
    serve(&server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// stdout carries the protocol, so logs must go to stderr.
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
