//! Binary entry point for the skywatch HTTP server.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use skywatch_core::Config;

/// Aggregation server for the sky-condition dashboard: ground observations,
/// short-range forecasts, geocoding and space weather behind one JSON API.
#[derive(Debug, Parser)]
#[command(name = "skywatch-server", version, about)]
struct Args {
    /// Path to a TOML configuration file (optional; defaults apply).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let app = skywatch_server::app::build(&config)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("listening on http://{addr}");
    axum::serve(listener, app).await.context("server exited")?;

    Ok(())
}
