//! University API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ http::server (request ID, trace, CORS, context)
//!                 │
//!                 ▼
//!              routing ──▶ http::dispatch ──▶ backend::pool
//!                                                │
//!                            resilience (breaker, retries, deadline)
//!                                                │
//!                                                ▼
//!                                     backend::transport ──▶ auth / chat /
//!                                                            employee / structure
//!
//!   health (active probes + passive outcomes) ──▶ GET /health
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use university_gateway::config::load_config;
use university_gateway::lifecycle::{signals, startup};
use university_gateway::observability::logging::init_logging;
use university_gateway::Shutdown;

#[derive(Debug, Parser)]
#[command(name = "university-gateway", version, about = "HTTP gateway for the university services")]
struct Args {
    /// TOML configuration file; environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref(), |key| std::env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        request_timeout_ms = config.server.request_timeout_ms,
        "university-gateway starting"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    match startup::run(config, &shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}
