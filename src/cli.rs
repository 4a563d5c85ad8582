//! Command-Line Interface (CLI) argument parsing.
//!
//! The arguments defined here are parsed at startup and merged on top of the
//! `alertstream.toml` file and environment variables, so anything passed on
//! the command line wins.

use clap::Parser;
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Receives alerts over HTTP and streams them to dashboards in real time.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to listen on for alerts and event streams.
    #[arg(short, long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// HTML file served as the dashboard.
    #[arg(long, value_name = "FILE")]
    pub dashboard: Option<PathBuf>,

    /// Pending messages buffered per subscriber before alerts are dropped.
    #[arg(long, value_name = "N")]
    pub queue_capacity: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Expose Prometheus metrics on the given address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_listen: Option<SocketAddr>,
}

/// Inserts `value` at `section.key`, creating the section if needed.
fn insert_nested(dict: &mut Dict, section: &str, key: &str, value: Value) {
    let entry = dict
        .entry(section.to_string())
        .or_insert_with(|| Value::Dict(Tag::Default, Dict::new()));
    if let Value::Dict(_, inner) = entry {
        inner.insert(key.to_string(), value);
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".to_string(), Value::from(level.clone()));
        }
        if let Some(addr) = self.listen {
            insert_nested(&mut dict, "server", "listen_address", Value::from(addr.to_string()));
        }
        if let Some(path) = &self.dashboard {
            insert_nested(
                &mut dict,
                "server",
                "dashboard_path",
                Value::from(path.to_string_lossy().into_owned()),
            );
        }
        if let Some(capacity) = self.queue_capacity {
            insert_nested(&mut dict, "stream", "queue_capacity", Value::from(capacity as u64));
        }
        // Giving an address implies turning the endpoint on.
        if let Some(addr) = self.metrics_listen {
            insert_nested(&mut dict, "metrics", "enabled", Value::from(true));
            insert_nested(&mut dict, "metrics", "listen_address", Value::from(addr.to_string()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
