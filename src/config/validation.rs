//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use mcshim_proto::TRADE_LIST_CHANNEL;
use thiserror::Error;

/// Longest plugin channel name the 1.8 - 1.12 clients accept.
const MAX_CHANNEL_LEN: usize = 20;

/// Upper bound on deferred delays: one minute of ticks.
const MAX_REMOVAL_DELAY_TICKS: u64 = 1200;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listen.address and listen.upstream must differ, both are {0}")]
    UpstreamIsListener(std::net::SocketAddr),
    #[error("scheduler.tick_millis must be greater than zero")]
    ZeroTick,
    #[error("intercept.send_queue must be greater than zero")]
    ZeroSendQueue,
    #[error("intercept.roster_removal_delay_ticks must be at most {max}, got {0}", max = MAX_REMOVAL_DELAY_TICKS)]
    RemovalDelayTooLong(u64),
    #[error("intercept.extra_channels entry is invalid: '{0}'")]
    InvalidChannel(String),
    #[error("intercept.extra_channels entry '{0}' is always dispatched")]
    RedundantChannel(String),
}

impl ValidationError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UpstreamIsListener(_) => "upstream_is_listener",
            Self::ZeroTick => "zero_tick",
            Self::ZeroSendQueue => "zero_send_queue",
            Self::RemovalDelayTooLong(_) => "removal_delay_too_long",
            Self::InvalidChannel(_) => "invalid_channel",
            Self::RedundantChannel(_) => "redundant_channel",
        }
    }
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen.address == config.listen.upstream {
        errors.push(ValidationError::UpstreamIsListener(config.listen.address));
    }

    if config.scheduler.tick_millis == 0 {
        errors.push(ValidationError::ZeroTick);
    }

    if config.intercept.send_queue == 0 {
        errors.push(ValidationError::ZeroSendQueue);
    }
    if config.intercept.roster_removal_delay_ticks > MAX_REMOVAL_DELAY_TICKS {
        errors.push(ValidationError::RemovalDelayTooLong(
            config.intercept.roster_removal_delay_ticks,
        ));
    }

    for channel in &config.intercept.extra_channels {
        if channel.is_empty() || channel.chars().count() > MAX_CHANNEL_LEN {
            errors.push(ValidationError::InvalidChannel(channel.clone()));
        } else if channel == TRADE_LIST_CHANNEL {
            errors.push(ValidationError::RedundantChannel(channel.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
