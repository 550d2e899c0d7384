//! Current-user endpoints
//!
//! - /api/user: bearer token (preferred)
//! - /api/me: legacy cookie session (deprecated)

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::auth::{
    AuthenticatedUser, SESSION_COOKIE, UserResponse, require_bearer, verify_session_token,
};
use crate::error::AppError;

const DEPRECATION: HeaderName = HeaderName::from_static("deprecation");

/// Create user router
///
/// Routes:
/// - GET /user - Claims of the bearer token
/// - GET /me - Identity from the session cookie
pub fn user_router(state: AppState) -> Router<AppState> {
    let bearer_routes = Router::new()
        .route("/user", get(current_user))
        .route_layer(middleware::from_fn_with_state(state, require_bearer));

    Router::new()
        .merge(bearer_routes)
        .route("/me", get(legacy_current_user))
}

/// GET /api/user
///
/// Echoes the verified token claims.
async fn current_user(AuthenticatedUser(claims): AuthenticatedUser) -> Json<UserResponse> {
    Json(UserResponse::from(&claims))
}

/// GET /api/me
///
/// Reads the signed session cookie set at sign-in. Responses carry
/// `Deprecation: true` and point at `/api/user`.
async fn legacy_current_user(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let cookie = jar
        .get(SESSION_COOKIE)
        .ok_or_else(|| AppError::unauthorized("Not authenticated"))?;
    let session = verify_session_token(cookie.value(), state.config.auth.cookie_secret())?;

    tracing::debug!(user_id = %session.identity.id, "Served deprecated cookie session lookup");

    Ok((
        [
            (DEPRECATION, "true"),
            (header::LINK, "</api/user>; rel=\"successor-version\""),
        ],
        Json(UserResponse::from(&session.identity)),
    )
        .into_response())
}
