//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::defaults::{
    default_metrics_port, default_roster_removal_delay, default_send_queue, default_tick_millis,
};
use super::listen::ListenConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Parse(_) => "parse",
        }
    }
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listener and upstream addresses.
    pub listen: ListenConfig,
    /// Tick domain for deferred messages.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Interception behavior.
    #[serde(default)]
    pub intercept: InterceptConfig,
    /// Prometheus endpoint.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Log output.
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Tick domain configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Milliseconds per tick (default: 50, i.e. 20 Hz).
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
        }
    }
}

/// Interception configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct InterceptConfig {
    /// Ticks between a synthetic player's roster add and its removal (default: 5).
    #[serde(default = "default_roster_removal_delay")]
    pub roster_removal_delay_ticks: u64,
    /// Plugin channels dispatched to handlers in addition to the trade list.
    #[serde(default)]
    pub extra_channels: Vec<String>,
    /// Outbound queue capacity per connection (default: 256).
    #[serde(default = "default_send_queue")]
    pub send_queue: usize,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            roster_removal_delay_ticks: default_roster_removal_delay(),
            extra_channels: Vec::new(),
            send_queue: default_send_queue(),
        }
    }
}

/// Metrics endpoint configuration.
///
/// Convention: `port = 0` disables the HTTP endpoint (used by tests).
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: Option<u16>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl MetricsConfig {
    /// The port to serve on, if the endpoint is enabled.
    pub fn enabled_port(&self) -> Option<u16> {
        self.port.filter(|port| *port != 0)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
}
