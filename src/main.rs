//! qrserve daemon entrypoint

use anyhow::Context;
use clap::Parser;
use qrserve::{AppState, QrServeConfig, QrService, logging, router};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "qrserve",
    version,
    about = "HTTP service generating downloadable QR codes"
)]
struct Cli {
    /// Optional configuration file (toml/yaml). Defaults to qrserve.{toml,yaml} in cwd/XDG config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the bind address (takes precedence over config file and env)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Override the listening port (takes precedence over `PORT`)
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Override the directory generated images are written to
    #[arg(long, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Override the log level filter (e.g. `debug`, `qrserve=trace`)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = QrServeConfig::load(cli.config.as_deref())?;

    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(dir) = cli.storage_dir {
        config.server.storage_dir = dir;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    logging::init(&config.logging)?;

    let symbol = config.symbol_config()?;
    let service = QrService::new(&config.server.storage_dir, symbol)?;
    info!(
        storage_dir = %service.storage_dir().display(),
        ?symbol,
        "Starting qrserve"
    );

    let state = AppState::new(service, config.logging.metrics_format);
    let reporter = state
        .metrics
        .spawn_reporter(config.logging.metrics_interval_secs);

    let address = config.server.socket_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(%address, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    reporter.abort();
    info!("qrserve stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
