//! mcshimd - Minecraft interception relay.
//!
//! Sits between players and an offline-mode server, routing every clientbound
//! play packet through a per-connection interception proxy.

use anyhow::Context;
use mcshim::config::{self, Config, LogFormat};
use mcshim::intercept::{HandlerRegistry, MessageClassifier};
use mcshim::network::Gateway;
use mcshim::proxy::{EntityTable, ProfileOverrides, ProxyDeps};
use mcshim::scheduler::{DeferredTaskScheduler, spawn_tick_task};
use mcshim::{http, metrics};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "mcshim.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(code = e.error_code(), error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {config_path}", errors.len());
    }

    info!(
        listen = %config.listen.address,
        upstream = %config.listen.upstream,
        "Starting mcshimd"
    );

    mcshim_proto::tables::init().context("accessor tables failed validation")?;

    let shutdown = CancellationToken::new();

    // Prometheus metrics are optional.
    // Convention: port = 0 disables the HTTP endpoint (used by tests).
    match config.metrics.enabled_port() {
        Some(port) => {
            metrics::init();
            tokio::spawn(http::run_http_server(port, shutdown.child_token()));
        }
        None => info!("Metrics disabled"),
    }

    let (scheduler, driver) = DeferredTaskScheduler::new();
    let tick = Duration::from_millis(config.scheduler.tick_millis);
    let tick_task = spawn_tick_task(driver, tick, shutdown.child_token());
    info!(tick_millis = config.scheduler.tick_millis, "Tick driver started");

    let registry = Arc::new(HandlerRegistry::new());
    let classifier = Arc::new(MessageClassifier::new(config.intercept.extra_channels.clone()));
    let deps = ProxyDeps::new(registry, scheduler)
        .with_classifier(classifier)
        .with_directory(Arc::new(EntityTable::new()))
        .with_profiles(Arc::new(ProfileOverrides::new()))
        .with_roster_removal_delay(config.intercept.roster_removal_delay_ticks);

    let gateway = Gateway::bind(&config.listen, config.intercept.send_queue, deps).await?;
    let gateway_task = tokio::spawn(gateway.run(shutdown.child_token()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutdown requested");
    shutdown.cancel();

    gateway_task.await??;
    tick_task.await?;
    Ok(())
}
