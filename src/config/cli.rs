//! Command-line and environment configuration.
//!
//! Flags win over their `RELAY_*` environment variables, which win over the
//! optional config file, which wins over built-in defaults.

use clap::Parser;
use std::path::PathBuf;
use url::Url;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{LogFormat, ProxyConfig, TlsConfig, WebSocketStrategy};
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "relay-proxy", version)]
#[command(about = "Single-hop HTTP/WebSocket reverse proxy", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Upstream origin, e.g. https://api.example.com
    #[arg(short, long, env = "RELAY_TARGET")]
    pub target: Option<Url>,

    /// Address to listen on
    #[arg(short, long, env = "RELAY_LISTEN")]
    pub listen: Option<String>,

    /// Fixed CORS origin; the request Origin is reflected when unset
    #[arg(long, env = "RELAY_ALLOWED_ORIGIN")]
    pub allowed_origin: Option<String>,

    /// Upstream connect timeout in seconds
    #[arg(long, env = "RELAY_CONNECT_TIMEOUT")]
    pub connect_timeout: Option<u64>,

    /// WebSocket idle timeout in seconds
    #[arg(long, env = "RELAY_IDLE_TIMEOUT")]
    pub idle_timeout: Option<u64>,

    /// How the upstream WebSocket handshake is made
    #[arg(long, env = "RELAY_WEBSOCKET_STRATEGY", value_enum)]
    pub websocket_strategy: Option<WebSocketStrategy>,

    /// PEM certificate for serving TLS
    #[arg(long, env = "RELAY_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<String>,

    /// PEM private key for serving TLS
    #[arg(long, env = "RELAY_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<String>,

    /// Log level
    #[arg(long, env = "RELAY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format
    #[arg(long, env = "RELAY_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "RELAY_METRICS_ADDRESS")]
    pub metrics_address: Option<String>,
}

impl Cli {
    /// Resolve the final, validated configuration.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(target) = self.target {
            config.upstream.target = target;
        }
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(origin) = self.allowed_origin {
            config.cors.allowed_origin = Some(origin);
        }
        if let Some(secs) = self.connect_timeout {
            config.timeouts.connect_secs = Some(secs);
        }
        if let Some(secs) = self.idle_timeout {
            config.timeouts.idle_secs = Some(secs);
        }
        if let Some(strategy) = self.websocket_strategy {
            config.upstream.websocket_strategy = strategy;
        }
        if let (Some(cert_path), Some(key_path)) = (self.tls_cert, self.tls_key) {
            config.listener.tls = Some(TlsConfig { cert_path, key_path });
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        if let Some(address) = self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = address;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}
