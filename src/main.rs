//! `transom`: serve an API from a configuration file.
//!
//! Registers the built-in plugins, listens until Ctrl+C, then shuts down
//! gracefully.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;

use transom_core::config::load_options;
use transom_core::observability::logging::init_logging;
use transom_core::plugins::{HealthCheck, RouteLogger};
use transom_core::TransomCore;

#[derive(Parser)]
#[command(name = "transom")]
#[command(about = "Serve a Transom API from a TOML or JSON options file", long_about = None)]
struct Cli {
    /// Options file (`.toml` or `.json`). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    tracing::info!("transom v{} starting", env!("CARGO_PKG_VERSION"));

    let options = match &cli.config {
        Some(path) => load_options(path)?,
        None => Value::Null,
    };

    let mut core = TransomCore::new();
    core.configure(RouteLogger, None::<Value>);
    core.configure(HealthCheck, None::<Value>);

    let mut server = core.initialize_default(options).await?;
    let addr = server.listen(cli.bind).await?;
    tracing::info!(address = %addr, server = %server, "Ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    server.close().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
