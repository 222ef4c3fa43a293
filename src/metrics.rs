//! Prometheus metrics collection for mcshim.
//!
//! Every metric is optional: recording before [`init`] is a no-op, so the
//! library can be embedded without a metrics endpoint.
//!
//! ## Interception Metrics
//!
//! - `mcshim_messages_classified_total{kind}` - Outbound messages by kind
//! - `mcshim_messages_suppressed_total{reason}` - Messages never forwarded
//! - `mcshim_dispatch_duration_seconds{kind}` - Handler chain latency
//! - `mcshim_handler_errors_total{owner, error}` - Failing callbacks
//! - `mcshim_codec_errors_total{error}` - Fields that could not be read

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Outbound messages classified, by intercept kind.
pub static MESSAGES_CLASSIFIED: OnceLock<IntCounterVec> = OnceLock::new();

/// Messages handed to a connection's original send path.
pub static MESSAGES_FORWARDED: OnceLock<IntCounter> = OnceLock::new();

/// Messages dropped by a handler verdict or a visibility rule.
pub static MESSAGES_SUPPRESSED: OnceLock<IntCounterVec> = OnceLock::new();

/// Callback failures (errors and panics), by owner and error code.
pub static HANDLER_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Field reads/rewrites that failed; the message went out unmodified.
pub static CODEC_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Send path failures, by error code.
pub static TRANSPORT_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Deferred messages delivered.
pub static DEFERRED_FIRED: OnceLock<IntCounter> = OnceLock::new();

/// Deferred messages dropped at fire time, by reason.
pub static DEFERRED_SKIPPED: OnceLock<IntCounterVec> = OnceLock::new();

/// Relayed sessions ended abnormally, by reason.
pub static RELAY_DISCONNECTS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Connections with an installed proxy.
pub static ACTIVE_CONNECTIONS: OnceLock<IntGauge> = OnceLock::new();

/// Registered interception handlers.
pub static REGISTERED_HANDLERS: OnceLock<IntGauge> = OnceLock::new();

/// Deferred tasks waiting for their tick.
pub static DEFERRED_PENDING: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Handler chain latency by intercept kind.
pub static DISPATCH_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(MESSAGES_CLASSIFIED, IntCounterVec::new(Opts::new("mcshim_messages_classified_total", "Outbound messages by intercept kind"), &["kind"]));
    register!(MESSAGES_FORWARDED, IntCounter::new("mcshim_messages_forwarded_total", "Messages forwarded to the original send path"));
    register!(MESSAGES_SUPPRESSED, IntCounterVec::new(Opts::new("mcshim_messages_suppressed_total", "Messages suppressed before reaching the wire"), &["reason"]));
    register!(HANDLER_ERRORS, IntCounterVec::new(Opts::new("mcshim_handler_errors_total", "Interception callback failures"), &["owner", "error"]));
    register!(CODEC_ERRORS, IntCounterVec::new(Opts::new("mcshim_codec_errors_total", "Fields that could not be decoded"), &["error"]));
    register!(TRANSPORT_ERRORS, IntCounterVec::new(Opts::new("mcshim_transport_errors_total", "Send path failures"), &["error"]));
    register!(DEFERRED_FIRED, IntCounter::new("mcshim_deferred_fired_total", "Deferred messages delivered"));
    register!(DEFERRED_SKIPPED, IntCounterVec::new(Opts::new("mcshim_deferred_skipped_total", "Deferred messages dropped at fire time"), &["reason"]));
    register!(RELAY_DISCONNECTS, IntCounterVec::new(Opts::new("mcshim_relay_disconnects_total", "Relayed sessions ended abnormally"), &["reason"]));
    register!(ACTIVE_CONNECTIONS, IntGauge::new("mcshim_active_connections", "Connections with an installed proxy"));
    register!(REGISTERED_HANDLERS, IntGauge::new("mcshim_registered_handlers", "Registered interception handlers"));
    register!(DEFERRED_PENDING, IntGauge::new("mcshim_deferred_tasks_pending", "Deferred tasks waiting for their tick"));
    register!(DISPATCH_LATENCY, HistogramVec::new(
        HistogramOpts::new("mcshim_dispatch_duration_seconds", "Handler chain latency by intercept kind")
            .buckets(vec![0.000_001, 0.000_005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01]),
        &["kind"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

#[inline]
fn inc_vec(metric: &OnceLock<IntCounterVec>, labels: &[&str]) {
    if let Some(c) = metric.get() {
        c.with_label_values(labels).inc();
    }
}

#[inline]
fn gauge(metric: &OnceLock<IntGauge>) -> Option<&IntGauge> {
    metric.get()
}

#[inline]
pub fn record_classified(kind: &str) {
    inc_vec(&MESSAGES_CLASSIFIED, &[kind]);
}

#[inline]
pub fn record_forwarded() {
    if let Some(c) = MESSAGES_FORWARDED.get() {
        c.inc();
    }
}

/// Record a message that never reached the wire (`handler` or `hidden`).
#[inline]
pub fn record_suppressed(reason: &str) {
    inc_vec(&MESSAGES_SUPPRESSED, &[reason]);
}

#[inline]
pub fn record_handler_error(owner: &str, error: &str) {
    inc_vec(&HANDLER_ERRORS, &[owner, error]);
}

#[inline]
pub fn record_codec_error(error: &str) {
    inc_vec(&CODEC_ERRORS, &[error]);
}

#[inline]
pub fn record_transport_error(error: &str) {
    inc_vec(&TRANSPORT_ERRORS, &[error]);
}

#[inline]
pub fn record_dispatch(kind: &str, duration_secs: f64) {
    if let Some(h) = DISPATCH_LATENCY.get() {
        h.with_label_values(&[kind]).observe(duration_secs);
    }
}

#[inline]
pub fn record_deferred_fired() {
    if let Some(c) = DEFERRED_FIRED.get() {
        c.inc();
    }
}

/// Record a deferred task dropped at fire time (`cancelled` or `closed`).
#[inline]
pub fn record_deferred_skipped(reason: &str) {
    inc_vec(&DEFERRED_SKIPPED, &[reason]);
}

#[inline]
pub fn set_deferred_pending(count: usize) {
    if let Some(g) = gauge(&DEFERRED_PENDING) {
        g.set(count as i64);
    }
}

#[inline]
pub fn set_registered_handlers(count: usize) {
    if let Some(g) = gauge(&REGISTERED_HANDLERS) {
        g.set(count as i64);
    }
}

#[inline]
pub fn connection_opened() {
    if let Some(g) = gauge(&ACTIVE_CONNECTIONS) {
        g.inc();
    }
}

#[inline]
pub fn connection_closed() {
    if let Some(g) = gauge(&ACTIVE_CONNECTIONS) {
        g.dec();
    }
}

#[inline]
pub fn record_relay_disconnect(reason: &str) {
    inc_vec(&RELAY_DISCONNECTS, &[reason]);
}
