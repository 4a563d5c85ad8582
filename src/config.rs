//! Configuration management for alertstream
//!
//! This module defines the main `Config` struct and its sub-structs. Values
//! are layered with `figment`: built-in defaults, then an optional
//! `alertstream.toml` file, then `ALERTSTREAM_` environment variables, and
//! finally command-line arguments.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// The configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "alertstream.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application. `RUST_LOG` takes precedence.
    pub log_level: String,
    /// Configuration for the HTTP listener and dashboard.
    pub server: ServerConfig,
    /// Configuration for the event stream.
    pub stream: StreamConfig,
    /// Configuration for the Prometheus metrics endpoint.
    pub metrics: MetricsConfig,
}

/// Configuration for the HTTP listener.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// The address the ingest and stream endpoints listen on.
    pub listen_address: SocketAddr,
    /// The HTML file served at `/`.
    pub dashboard_path: PathBuf,
}

/// Configuration for per-subscriber streaming.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StreamConfig {
    /// The number of pending messages a subscriber may hold before new
    /// broadcasts are dropped for it.
    pub queue_capacity: usize,
    /// Interval for SSE keep-alive comments. `0` disables them.
    pub keep_alive_seconds: u64,
}

/// Configuration for the metrics system.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder and serve `/metrics`.
    pub enabled: bool,
    /// The address the metrics endpoint listens on.
    pub listen_address: SocketAddr,
}

/// Semantic errors in an otherwise well-formed configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("stream.queue_capacity must be greater than zero")]
    ZeroQueueCapacity,
    #[error("server.listen_address and metrics.listen_address must differ (both are {0})")]
    ListenAddressConflict(SocketAddr),
}

impl Config {
    /// Loads the configuration, layering the file named by `--config` (or
    /// [`DEFAULT_CONFIG_FILE`]), the environment, and the CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config: Config = Self::figment(cli).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the layered provider without extracting it.
    pub fn figment(cli: &Cli) -> Figment {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // e.g. ALERTSTREAM_STREAM__QUEUE_CAPACITY=32
            .merge(Env::prefixed("ALERTSTREAM_").split("__"))
            .merge(cli.clone())
    }

    /// Checks constraints that the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.metrics.enabled
            && self.metrics.listen_address.port() != 0
            && self.metrics.listen_address == self.server.listen_address
        {
            return Err(ConfigError::ListenAddressConflict(self.server.listen_address));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                listen_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
                dashboard_path: PathBuf::from("index.html"),
            },
            stream: StreamConfig {
                queue_capacity: 10,
                keep_alive_seconds: 15,
            },
            metrics: MetricsConfig {
                enabled: false,
                listen_address: SocketAddr::from(([127, 0, 0, 1], 9090)),
            },
        }
    }
}
