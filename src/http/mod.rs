//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, trace ID, deadline)
//!     → dispatch.rs (route lookup, payload assembly)
//!     → backend pool (retry, circuit breaker)
//!     → response.rs (JSON body or error envelope)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod endpoints;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID, X_TRACE_ID};
pub use response::{ErrorEnvelope, GatewayError};
pub use server::{AppState, GatewayServer};
