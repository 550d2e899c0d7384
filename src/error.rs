//! Error types for Sessiongate
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::{OAuthError, TokenError};

/// Application-wide error type
///
/// Every variant maps to one HTTP status code and a JSON body of the
/// form `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required or rejected (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Sign-in requested for a provider that is not registered (400)
    #[error("no provider for {0} exists")]
    UnknownProvider(String),

    /// Session token could not be issued (500) or was rejected (401)
    #[error(transparent)]
    Token(#[from] TokenError),

    /// OAuth callback failure (500)
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a 401 with the given message
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    fn status_and_message(&self) -> (StatusCode, String, &'static str) {
        match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), "unauthorized"),
            AppError::UnknownProvider(_) => {
                (StatusCode::BAD_REQUEST, self.to_string(), "unknown_provider")
            }
            AppError::Token(err) if err.is_rejection() => {
                (StatusCode::UNAUTHORIZED, err.to_string(), "invalid_token")
            }
            AppError::Token(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to issue session token".to_string(),
                "token_signing",
            ),
            AppError::OAuth(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("auth error: {err}"),
                "oauth",
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Encryption(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "encryption")
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        } else {
            tracing::debug!(error = %self, error_type, "Request rejected");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
