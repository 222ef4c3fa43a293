//! Network module.
//!
//! Contains the Gateway (TCP listener) and the relay session that installs a
//! proxy on every intercepted player connection.

mod gateway;
pub mod relay;

pub use gateway::Gateway;
pub use relay::{Handshake, Session, SessionConfig};
