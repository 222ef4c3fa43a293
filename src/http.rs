//! HTTP endpoint for Prometheus scraping and liveness checks.
//!
//! `/metrics` serves the text exposition format, `/healthz` answers `ok`
//! while the relay runs. The server stops with the relay's shutdown token.

use axum::{Router, routing::get};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
}

/// Serve [`router`] on an already bound listener until `shutdown`.
pub async fn serve(listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

/// Bind `0.0.0.0:port` and serve until `shutdown`. Errors are logged; the
/// relay keeps running without metrics.
pub async fn run_http_server(port: u16, shutdown: CancellationToken) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind metrics endpoint");
            return;
        }
    };
    tracing::info!(%addr, "Metrics endpoint listening");

    if let Err(e) = serve(listener, shutdown).await {
        tracing::error!(error = %e, "Metrics endpoint failed");
    }
}
