//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    handlers::{router, AppState},
    internal_metrics::{Metrics, MetricsBuilder},
    registry::SubscriberRegistry,
    server::HttpServer,
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, instrument};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    local_addr: SocketAddr,
    metrics_addr: Option<SocketAddr>,
    registry: Arc<SubscriberRegistry>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the alert API is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// The registry shared by every handler.
    pub fn registry(&self) -> Arc<SubscriberRegistry> {
        self.registry.clone()
    }

    /// Waits for the shutdown signal and then waits for all tasks to stop.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        // An error means the sender is gone, which is as good as a signal.
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown().await
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// swap in their own pieces.
pub struct AppBuilder {
    config: Config,
    metrics_override: Option<Metrics>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            metrics_override: None,
        }
    }

    /// Overrides the metrics system for testing.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Binds the listeners and spawns the servers, returning a runnable `App`.
    ///
    /// Failing to bind the alert API listener is fatal.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        config.validate()?;
        let task_manager = TaskManager::new(shutdown_rx.clone());

        // =========================================================================
        // 1. Metrics
        // =========================================================================
        let (metrics, metrics_server) = match self.metrics_override {
            Some(m) => (m, None),
            None => MetricsBuilder::new(config.metrics.clone())
                .build(shutdown_rx.clone())
                .await,
        };
        let metrics_addr = metrics_server.map(|(server, addr)| {
            info!("Metrics available at http://{}/metrics", addr);
            task_manager.spawn(server.name(), server.run());
            addr
        });

        // =========================================================================
        // 2. Subscriber registry, shared with every handler
        // =========================================================================
        let registry = Arc::new(SubscriberRegistry::new(metrics.clone()));

        // =========================================================================
        // 3. Alert API
        // =========================================================================
        let listener = TcpListener::bind(config.server.listen_address)
            .await
            .with_context(|| format!("failed to bind {}", config.server.listen_address))?;
        let local_addr = listener.local_addr()?;

        let state = AppState {
            registry: registry.clone(),
            stream: config.stream.clone(),
            dashboard_path: config.server.dashboard_path.clone(),
            metrics,
        };
        let server = HttpServer::new("AlertServer", listener, router(state), shutdown_rx);
        task_manager.spawn(server.name(), server.run());

        info!("Alert server listening on {}", local_addr);
        info!("POST alerts to: http://{}/alert", local_addr);
        info!("View dashboard at: http://{}/", local_addr);

        Ok(App {
            task_manager,
            local_addr,
            metrics_addr,
            registry,
        })
    }
}
