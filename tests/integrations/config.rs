use alertstream::cli::Cli;
use alertstream::config::Config;
use clap::Parser;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// A helper function to run a test with a temporary config file.
fn with_config_file<F>(toml_content: &str, test_fn: F)
where
    F: FnOnce(PathBuf),
{
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    test_fn(file.path().to_path_buf());
}

#[test]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        [server]
        listen_address = "127.0.0.1:9000"
        dashboard_path = "/srv/alertstream/index.html"
        [stream]
        queue_capacity = 32
        keep_alive_seconds = 0
        [metrics]
        enabled = true
        listen_address = "127.0.0.1:9100"
    "#;

    with_config_file(toml_content, |path| {
        let cli = Cli::try_parse_from(["alertstream", "--config", path.to_str().unwrap()]).unwrap();
        let config = Config::load(&cli).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.listen_address, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.server.dashboard_path, PathBuf::from("/srv/alertstream/index.html"));
        assert_eq!(config.stream.queue_capacity, 32);
        assert_eq!(config.stream.keep_alive_seconds, 0);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.listen_address, "127.0.0.1:9100".parse::<SocketAddr>().unwrap());
    });
}

#[test]
fn test_partial_config_keeps_defaults() {
    with_config_file("[stream]\nqueue_capacity = 3\n", |path| {
        let cli = Cli::try_parse_from(["alertstream", "--config", path.to_str().unwrap()]).unwrap();
        let config = Config::load(&cli).unwrap();

        let defaults = Config::default();
        assert_eq!(config.stream.queue_capacity, 3);
        assert_eq!(config.stream.keep_alive_seconds, defaults.stream.keep_alive_seconds);
        assert_eq!(config.server, defaults.server);
        assert_eq!(config.log_level, "info");
    });
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let cli = Cli::try_parse_from(["alertstream", "--config", "/nonexistent/alertstream.toml"]).unwrap();
    let config = Config::load(&cli).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.server.listen_address.port(), 8080);
    assert_eq!(config.stream.queue_capacity, 10);
}

#[test]
fn test_cli_overrides_file() {
    let toml_content = r#"
        [server]
        listen_address = "127.0.0.1:9000"
        [stream]
        queue_capacity = 32
    "#;

    with_config_file(toml_content, |path| {
        let cli = Cli::try_parse_from([
            "alertstream",
            "--config",
            path.to_str().unwrap(),
            "--listen",
            "127.0.0.1:7000",
            "--queue-capacity",
            "5",
            "--log-level",
            "trace",
            "--metrics-listen",
            "127.0.0.1:7100",
        ])
        .unwrap();
        let config = Config::load(&cli).unwrap();

        assert_eq!(config.server.listen_address, "127.0.0.1:7000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.server.dashboard_path, PathBuf::from("index.html"));
        assert_eq!(config.stream.queue_capacity, 5);
        assert_eq!(config.log_level, "trace");
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.listen_address, "127.0.0.1:7100".parse::<SocketAddr>().unwrap());
    });
}

#[test]
fn test_zero_queue_capacity_fails_to_load() {
    with_config_file("[stream]\nqueue_capacity = 0\n", |path| {
        let cli = Cli::try_parse_from(["alertstream", "--config", path.to_str().unwrap()]).unwrap();
        let err = Config::load(&cli).unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    });
}

#[test]
fn test_malformed_config_fails_to_load() {
    with_config_file("[server]\nlisten_address = \"not an address\"\n", |path| {
        let cli = Cli::try_parse_from(["alertstream", "--config", path.to_str().unwrap()]).unwrap();
        assert!(Config::load(&cli).is_err());
    });
}
