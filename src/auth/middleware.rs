//! Authentication middleware
//!
//! Protects routes that require a bearer token.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use super::token::Claims;
use crate::AppState;
use crate::error::AppError;
use crate::metrics::AUTH_REJECTIONS_TOTAL;

/// Pull the token out of `Authorization: Bearer <token>`
///
/// The header must split on its first space into exactly two parts, the
/// first being `Bearer` (case-sensitive).
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers.get(AUTHORIZATION).ok_or_else(|| {
        AUTH_REJECTIONS_TOTAL.with_label_values(&["missing_header"]).inc();
        AppError::unauthorized("Authorization header required")
    })?;

    let invalid_format = || {
        AUTH_REJECTIONS_TOTAL.with_label_values(&["invalid_format"]).inc();
        AppError::unauthorized("Invalid authorization format")
    };

    let value = value.to_str().map_err(|_| invalid_format())?;
    match value.split_once(' ') {
        Some(("Bearer", token)) => Ok(token),
        _ => Err(invalid_format()),
    }
}

fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Claims, AppError> {
    let token = extract_bearer_token(headers)?;
    state.tokens.verify(token).map_err(|error| {
        AUTH_REJECTIONS_TOTAL.with_label_values(&["invalid_token"]).inc();
        AppError::Token(error)
    })
}

/// Middleware to require a valid bearer token
///
/// Adds the decoded [`Claims`] to request extensions if valid; otherwise
/// responds 401 and the inner handler never runs.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/api/user", get(handler))
///     .route_layer(middleware::from_fn_with_state(state, require_bearer));
/// ```
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(request.headers(), &state)?;

    tracing::debug!(user_id = %claims.id, provider = %claims.provider, "Bearer token accepted");
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Extractor for the authenticated caller's claims
///
/// Reads the claims left by [`require_bearer`], or verifies the header
/// itself when used on a route without the middleware.
///
/// # Usage
/// ```ignore
/// async fn handler(AuthenticatedUser(claims): AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, {}", claims.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>().cloned() {
            return Ok(AuthenticatedUser(claims));
        }

        let state = AppState::from_ref(state);
        let claims = authenticate(&parts.headers, &state)?;
        parts.extensions.insert(claims.clone());

        Ok(AuthenticatedUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    fn message(result: Result<&str, AppError>) -> String {
        match result {
            Err(AppError::Unauthorized(message)) => message,
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn bearer_token_is_extracted() {
        let headers = headers(Some("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_header_is_rejected() {
        let headers = headers(None);
        assert_eq!(
            message(extract_bearer_token(&headers)),
            "Authorization header required"
        );
    }

    #[test]
    fn other_schemes_are_rejected() {
        for value in ["Basic dXNlcjpwYXNz", "bearer abc", "BEARER abc", "Bearer", "Token abc"] {
            let headers = headers(Some(value));
            assert_eq!(
                message(extract_bearer_token(&headers)),
                "Invalid authorization format",
                "{value:?} should be rejected"
            );
        }
    }
}
