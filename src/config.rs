// file: src/config.rs
// description: runtime configuration assembled from CLI arguments and environment

use crate::{cli::Args, error::SecwatchError};
use anyhow::Result;
use std::time::Duration;
use url::Url;

/// Environment variable consulted when `--url` is not given.
pub const WS_URL_ENV: &str = "SECWATCH_WS_URL";
/// Loopback default for local development.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8765/ws";

#[derive(Debug, Clone)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub url: Url,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    /// 0 means retry forever.
    pub max_reconnects: u32,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub colored: bool,
    pub quiet: bool,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        let raw_url = args
            .url
            .clone()
            .or_else(|| std::env::var(WS_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        let url = Url::parse(&raw_url).map_err(SecwatchError::Url)?;

        Ok(Config {
            connection: ConnectionConfig {
                url,
                connect_timeout: Duration::from_secs(args.connect_timeout),
                reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
                max_reconnects: args.max_reconnects,
            },
            metrics: MetricsConfig {
                enabled: args.metrics,
                port: args.metrics_port,
            },
            logging: LoggingConfig {
                colored: !args.no_color,
                quiet: args.quiet,
            },
        })
    }
}
