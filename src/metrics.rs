//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Authentication Metrics
    pub static ref TOKENS_ISSUED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sessiongate_tokens_issued_total", "Total number of session tokens issued"),
        &["provider"]
    ).expect("metric can be created");
    pub static ref OAUTH_CALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sessiongate_oauth_callbacks_total", "Total number of OAuth callbacks handled"),
        &["provider", "outcome"]
    ).expect("metric can be created");
    pub static ref AUTH_REJECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sessiongate_auth_rejections_total", "Total number of rejected bearer credentials"),
        &["reason"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sessiongate_errors_total", "Total number of error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(TOKENS_ISSUED_TOTAL.clone()))
            .expect("TOKENS_ISSUED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(OAUTH_CALLBACKS_TOTAL.clone()))
            .expect("OAUTH_CALLBACKS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(AUTH_REJECTIONS_TOTAL.clone()))
            .expect("AUTH_REJECTIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_metrics();
        init_metrics();

        ERRORS_TOTAL.with_label_values(&["test"]).inc();
        let names: Vec<String> = REGISTRY
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"sessiongate_errors_total".to_string()));
    }
}
