//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Build the gateway from validated configuration
//! - Bind the listener and serve until shutdown
//!
//! Logging is initialized by the caller, before this runs, so that config
//! errors are already reported through it.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::backend::target::AddressError;
use crate::config::GatewayConfig;
use crate::http::GatewayServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics::init_metrics;

/// Anything that stops the gateway from coming up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Backend(#[from] AddressError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Bring the gateway up and serve until `shutdown` fires.
pub async fn run(config: GatewayConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        init_metrics(addr)?;
    }

    let bind_address = config.listener.bind_address.clone();
    let server = GatewayServer::new(config)?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
