use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod api;
mod config;
mod middleware;

use config::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "toolgate")]
#[command(about = "Expose application actions to AI agents over MCP", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TOOLGATE_CONFIG", default_value = "toolgate.toml")]
    config: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "TOOLGATE_PORT", default_value = "8080")]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "TOOLGATE_HOST", default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolgate=info,tower_http=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let args = Args::parse();

    tracing::info!("Starting Toolgate MCP gateway");
    tracing::info!("Configuration file: {}", args.config.display());

    // Load configuration
    let config = ServerConfig::load(&args.config)?;

    // Start API server
    let addr = format!("{}:{}", args.host, args.port);
    tracing::info!("Starting API server on {}", addr);

    api::serve(&addr, config).await?;

    Ok(())
}
