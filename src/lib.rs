//! Sessiongate - OAuth2 sign-in gateway issuing self-contained session tokens
//!
//! # Flow
//!
//! ```text
//! browser ──► GET /auth/:provider ──► provider consent page
//!                                           │
//!             GET /auth/:provider/callback ◄┘
//!                      │  exchange code, fetch profile
//!                      ▼
//!              TokenIssuer::issue ──► 302 to frontend (?token=...)
//!
//! client ──► GET /api/user (Authorization: Bearer <token>)
//!                      │  require_bearer verifies signature and expiry
//!                      ▼
//!                   handler sees Claims
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers for user lookup and metrics
//! - `auth`: OAuth providers, token issuer, middleware
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, middleware, routing::get};

use crate::auth::{ProviderRegistry, TokenIssuer};

/// Application state shared across all handlers
///
/// Immutable after startup; cloned for each request.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Issues and verifies session tokens with the configured secret
    pub tokens: Arc<TokenIssuer>,

    /// OAuth providers reachable under /auth/:provider, sharing one
    /// HTTP client with bounded timeouts
    pub providers: Arc<ProviderRegistry>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Register metrics
    /// 2. Build the provider HTTP client with a bounded timeout
    /// 3. Construct the token issuer and provider registry
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        metrics::init_metrics();

        let timeout = Duration::from_secs(config.auth.provider_timeout_seconds);
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("sessiongate/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        let tokens = TokenIssuer::new(&config.auth.jwt_secret, config.auth.token_ttl_seconds);
        let providers = ProviderRegistry::from_config(&config, http_client);

        tracing::info!(
            providers = ?providers.names(),
            token_ttl_seconds = config.auth.token_ttl_seconds,
            "Application state initialized successfully"
        );

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            providers: Arc::new(providers),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> Router {
    use tower::ServiceBuilder;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config);
    let metrics_routes = api::metrics_router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_bearer,
    ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(auth::auth_router())
        .nest("/api", api::user_router(state.clone()))
        .merge(metrics_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(state)
}

/// Static cross-origin policy with credentials for the allowed origins
fn build_cors_layer(config: &config::AppConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::{AllowOrigin, CorsLayer};

    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .into_iter()
        .filter_map(|origin| {
            if origin == "*" {
                tracing::warn!("Wildcard CORS origin ignored; credentialed requests need explicit origins");
                return None;
            }
            match HeaderValue::from_str(&origin) {
                Ok(value) => Some(value),
                Err(error) => {
                    tracing::error!(%error, origin = %origin, "Failed to parse CORS origin");
                    None
                }
            }
        })
        .collect();

    tracing::debug!(origins = ?origins, "CORS allow-list configured");

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ORIGIN,
        ])
        .allow_credentials(true)
        .expose_headers([header::CONTENT_LENGTH])
        .max_age(Duration::from_secs(config.cors.max_age_seconds))
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Hello World" }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "up" }))
}
