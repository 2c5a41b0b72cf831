//! adsync Server - Headless Daemon
//!
//! Exposes the sync engine over HTTP on /api/* and as one-shot CLI commands.
//!
//! Access via: http://localhost:8046

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod commands;
mod router;
mod server_utils;
mod state;

#[cfg(test)]
mod test_helpers;

use adsync_core::modules::config as core_config;
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        None => run_server(cli.port).await,
        Some(Commands::Serve { port }) => run_server(port.or(cli.port)).await,
        Some(Commands::Sync { network, fallback, json }) => {
            commands::handle_sync(network, fallback, json).await
        },
        Some(Commands::Validate { network, json }) => commands::handle_validate(network, json).await,
        Some(Commands::Pending { network }) => commands::handle_pending(network).await,
    }
}

async fn run_server(port: Option<u16>) -> Result<()> {
    let config = core_config::load_config()?;
    let data_dir = core_config::get_data_dir()?;
    let port = port.unwrap_or(config.server.port);

    info!("adsync server v{} starting on port {}", env!("CARGO_PKG_VERSION"), port);

    if adsync_core::metrics::init_metrics().is_none() {
        tracing::warn!("Metrics recorder unavailable; /api/metrics will be empty");
    }

    let state = AppState::initialize(&config, &data_dir).await?;
    let gate = state.engine().gate_status();
    info!(queue_depth = gate.queue_depth, "Engine ready, data dir {}", data_dir.display());

    let app = router::build_router(state);
    let listener = server_utils::create_listener(port, &config.server).await?;

    info!("API available at http://{}:{}/api/", config.server.get_bind_address(), port);

    axum::serve(listener, app).with_graceful_shutdown(server_utils::shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}
