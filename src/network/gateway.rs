//! Gateway - TCP listener that accepts player connections.
//!
//! The Gateway binds the listen socket and spawns a relay [`Session`] for
//! each incoming client.

use crate::config::ListenConfig;
use crate::network::relay::{Session, SessionConfig};
use crate::proxy::ProxyDeps;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, instrument};

/// The Gateway accepts incoming TCP connections and spawns relay sessions.
pub struct Gateway {
    listener: TcpListener,
    session: SessionConfig,
    deps: ProxyDeps,
    next_id: AtomicU64,
}

impl Gateway {
    /// Bind the gateway to `listen.address`.
    pub async fn bind(listen: &ListenConfig, send_queue: usize, deps: ProxyDeps) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(listen.address).await?;
        info!(address = %listen.address, upstream = %listen.upstream, "Listener bound");

        Ok(Self {
            listener,
            session: SessionConfig {
                upstream: listen.upstream,
                send_queue,
            },
            deps,
            next_id: AtomicU64::new(1),
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled.
    ///
    /// Sessions already running receive a child token and end with the
    /// gateway.
    #[instrument(skip(self, shutdown), name = "gateway")]
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Gateway shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    info!(id, %addr, "Connection accepted");

                    let session = Session::new(
                        id,
                        stream,
                        addr,
                        self.session.clone(),
                        self.deps.clone(),
                        shutdown.child_token(),
                    );
                    let span = crate::telemetry::spans::session(id, &addr);
                    tokio::spawn(
                        async move {
                            match session.run().await {
                                Ok(()) => {
                                    crate::metrics::record_relay_disconnect("closed");
                                    info!("Connection closed");
                                }
                                Err(e) => {
                                    crate::metrics::record_relay_disconnect(e.error_code());
                                    error!(error = %e, "Connection error");
                                }
                            }
                        }
                        .instrument(span),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}
