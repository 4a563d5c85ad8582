//! alertstream - receives alerts over HTTP and streams them to dashboards.

use alertstream::{app::App, cli::Cli, config::Config};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli).context("failed to load configuration")?;

    // RUST_LOG, when set, overrides the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("alertstream starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}", config.server.listen_address);
    info!("Dashboard: {}", config.server.dashboard_path.display());
    info!("Subscriber Queue Capacity: {}", config.stream.queue_capacity);
    if config.stream.keep_alive_seconds > 0 {
        info!("Keep-Alive Interval: {}s", config.stream.keep_alive_seconds);
    } else {
        info!("Keep-Alive Interval: Disabled");
    }
    info!(
        "Metrics: {}",
        if config.metrics.enabled {
            config.metrics.listen_address.to_string()
        } else {
            "Disabled".to_string()
        }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down."),
            Err(e) => error!("Failed to listen for Ctrl-C, shutting down: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    app.run().await
}
