//! API layer
//!
//! HTTP handlers for:
//! - Current user lookup (bearer token and legacy cookie)
//! - Metrics (Prometheus)

pub mod metrics;
mod user;

pub use metrics::metrics_router;
pub use user::user_router;
