// src/main.rs
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

mod aggregator;
mod config;
mod probe;
mod registry;
mod reporter;
mod server;

use crate::{
    aggregator::Aggregator,
    probe::{Probe, Prober},
    registry::Registry,
    server::{AppState, RequestHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("health_aggregator=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HEALTH_AGGREGATOR_CONFIG").ok())
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // A bad registry refuses to start rather than serve an inconsistent view.
    let registry = Registry::from_config(&config).context("invalid service configuration")?;
    info!("Registry loaded with {} services", registry.len());

    let prober: Arc<dyn Probe> = Arc::new(Prober::new());
    let aggregator = Aggregator::new(prober, config.global_timeout());

    let state = Arc::new(AppState {
        registry,
        aggregator,
    });

    // Start status server
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen_addr: {}", config.listen_addr))?;
    info!("Starting health aggregator on {}", addr);

    ServerBuilder::new(addr)
        .with_handler(RequestHandler::new(state))
        .serve(shutdown_signal())
        .await?;

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
