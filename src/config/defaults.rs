//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Scheduler Defaults
// =============================================================================

/// One game tick at 20 Hz.
pub fn default_tick_millis() -> u64 {
    50
}

// =============================================================================
// Intercept Defaults
// =============================================================================

/// Ticks between announcing a synthetic player and withdrawing it from the
/// client's roster. Long enough for the client to fetch the skin.
pub fn default_roster_removal_delay() -> u64 {
    5
}

/// Per-connection outbound queue capacity before SendQ overflow.
pub fn default_send_queue() -> usize {
    256
}

// =============================================================================
// Metrics Defaults
// =============================================================================

pub fn default_metrics_port() -> Option<u16> {
    Some(9090)
}
