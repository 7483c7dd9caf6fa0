//! Gatehouse server binary.

use anyhow::{Context, Result};
use clap::Parser;
use gatehouse_server::bootstrap::{build_state, load_config};
use gatehouse_server::create_router;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Gatehouse - a storage gateway executing trusted prepared statements
#[derive(Parser, Debug)]
#[command(name = "gatehoused")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "GATEHOUSE_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Gatehouse v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    gatehouse_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let state = build_state(config.clone()).await?;

    let _sweeper_handle = state.spawn_token_sweeper();
    tracing::info!(
        interval_secs = config.tokens.sweep_interval_secs,
        "Delegation token sweeper spawned"
    );

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
