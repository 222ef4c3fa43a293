//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, SchedulerConfig, InterceptConfig)
//! - [`listen`]: Relay listener configuration (ListenConfig)
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup validation collecting every problem at once

pub mod defaults;
mod listen;
mod types;
pub mod validation;

pub use listen::ListenConfig;
pub use types::{
    Config, ConfigError, InterceptConfig, LogConfig, LogFormat, MetricsConfig, SchedulerConfig,
};
pub use validation::{validate, ValidationError};
