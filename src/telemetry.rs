//! Telemetry utilities for dispatch timing and log correlation.

use std::time::Instant;

/// Guard for timing a handler chain and recording metrics.
///
/// Records dispatch latency when dropped.
pub struct DispatchTimer {
    kind: &'static str,
    start: Instant,
}

impl DispatchTimer {
    /// Start timing a dispatch for messages of `kind`.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            start: Instant::now(),
        }
    }
}

impl Drop for DispatchTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_dispatch(self.kind, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use std::net::SocketAddr;
    use tracing::{Span, info_span};

    /// Span for a relayed client session, before the player is known.
    pub fn session(id: u64, addr: &SocketAddr) -> Span {
        info_span!("session", id, addr = %addr, player = tracing::field::Empty)
    }

    /// Span for the play phase of an intercepted connection.
    pub fn connection(id: u64, player: &str, version: &str) -> Span {
        info_span!("connection", id, player = %player, version = %version)
    }
}
