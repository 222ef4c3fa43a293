//! Relay listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// Relay listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address clients connect to (e.g., "0.0.0.0:25565").
    pub address: SocketAddr,
    /// Minecraft server the relay forwards to. It must run in offline mode
    /// with network compression disabled.
    pub upstream: SocketAddr,
}
