//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup, most specific pattern first)
//!     → matcher.rs (segment-wise pattern match, parameter capture)
//!     → Return: Matched route, MethodNotAllowed or NotFound
//!
//! Route Compilation (at startup):
//!     Route catalogue
//!     → Sort by specificity (literals before parameters)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{PathParams, PathPattern};
pub use router::{Route, RouteMatch, RouteTable};
