//! # Internal Metrics Module
//!
//! Infrastructure for collecting and exposing application metrics.
//!
//! - **`MetricsBuilder`** installs the Prometheus recorder, binds the
//!   `/metrics` listener and constructs the `Metrics` handle.
//! - **`Metrics`** is a cheap, cloneable handle used by the ingest endpoint
//!   and the subscriber registry to update predefined metrics.
//!
//! When metrics are disabled no recorder is installed and every handle is a
//! no-op.

use crate::config::MetricsConfig;
use crate::server::HttpServer;
use axum::{routing::get, Router};
use metrics::{Counter, Gauge, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::error;

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub alerts_received_total: Counter,
    pub broadcast_deliveries_total: Counter,
    pub broadcast_dropped_total: Counter,
    pub active_subscribers: Gauge,
    pub broadcast_duration_seconds: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Registers descriptions for all metrics with the global recorder and
    /// returns handles bound to it.
    pub fn new() -> Self {
        metrics::describe_counter!("alerts_received_total", Unit::Count, "Total number of alerts accepted by the ingest endpoint.");
        metrics::describe_counter!("alerts_rejected_total", Unit::Count, "Total number of ingest requests rejected, labeled by reason.");
        metrics::describe_counter!("broadcast_deliveries_total", Unit::Count, "Total number of messages enqueued onto subscriber queues.");
        metrics::describe_counter!("broadcast_dropped_total", Unit::Count, "Total number of messages dropped because a subscriber queue was full.");
        metrics::describe_gauge!("active_subscribers", Unit::Count, "The current number of connected event stream subscribers.");
        metrics::describe_histogram!("broadcast_duration_seconds", Unit::Seconds, "Time taken to offer one message to every subscriber.");

        Self {
            alerts_received_total: metrics::counter!("alerts_received_total"),
            broadcast_deliveries_total: metrics::counter!("broadcast_deliveries_total"),
            broadcast_dropped_total: metrics::counter!("broadcast_dropped_total"),
            active_subscribers: metrics::gauge!("active_subscribers"),
            broadcast_duration_seconds: metrics::histogram!("broadcast_duration_seconds"),
        }
    }

    /// Increments the rejection counter for an ingest request.
    pub fn increment_alert_rejected(&self, reason: &'static str) {
        metrics::counter!("alerts_rejected_total", "reason" => reason).increment(1);
    }

    /// Sets the gauge for the number of connected subscribers.
    pub fn set_active_subscribers(&self, count: usize) {
        self.active_subscribers.set(count as f64);
    }

    /// Creates a `Metrics` instance suitable for testing.
    ///
    /// Without an installed recorder the `metrics` crate hands out no-op
    /// handles, so components can be exercised without a backend.
    pub fn new_for_test() -> Self {
        Self::new()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    /// Creates a new `MetricsBuilder` with the given configuration.
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system.
    ///
    /// Returns the `Metrics` handle and, when enabled, the server exposing
    /// `/metrics` together with its bound address. Any failure to set up the
    /// exporter is logged and degrades to no-op metrics rather than stopping
    /// the application.
    pub async fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Metrics, Option<(HttpServer, SocketAddr)>) {
        if !self.config.enabled {
            return (Metrics::new(), None);
        }

        let recorder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1],
        ) {
            Ok(builder) => builder.build_recorder(),
            Err(e) => {
                error!("Failed to configure Prometheus buckets: {}", e);
                return (Metrics::new(), None);
            }
        };
        let handle = recorder.handle();

        // Bind before installing the recorder so a bind failure leaves the
        // global recorder untouched.
        let listener = match TcpListener::bind(self.config.listen_address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(
                    "Failed to bind metrics server to {}: {}",
                    self.config.listen_address, e
                );
                return (Metrics::new(), None);
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get local address for metrics server: {}", e);
                return (Metrics::new(), None);
            }
        };

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::new(), None);
        }

        let router = Router::new().route("/metrics", get(move || async move { handle.render() }));
        let server = HttpServer::new("MetricsServer", listener, router, shutdown_rx);

        (Metrics::new(), Some((server, addr)))
    }
}
