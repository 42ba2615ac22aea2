//! University API gateway library.
//!
//! Fronts four JSON-over-HTTP backends (auth, chat, employee, structure)
//! with per-backend retries, circuit breakers and health tracking.

pub mod backend;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
