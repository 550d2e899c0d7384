//! OAuth sign-in flow
//!
//! Implements the OAuth 2.0 authorization code flow against any provider
//! in the registry, ending in a signed session token.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use url::Url;

use super::provider::{CallbackParams, OAuthError};
use super::session::{LegacySession, SESSION_COOKIE, create_session_token};
use crate::AppState;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::metrics::{OAUTH_CALLBACKS_TOTAL, TOKENS_ISSUED_TOTAL};

/// Cookie carrying the CSRF state between redirect and callback
pub const STATE_COOKIE: &str = "oauth_state";

/// Lifetime of the CSRF state cookie
const STATE_COOKIE_MAX_AGE_SECONDS: i64 = 600;

/// Create authentication router
///
/// Routes:
/// - GET /auth/logout - Clear session cookies
/// - GET /auth/:provider - Redirect to provider
/// - GET /auth/:provider/callback - OAuth callback
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", get(logout))
        .route("/auth/:provider", get(begin_auth))
        .route("/auth/:provider/callback", get(auth_callback))
}

// =============================================================================
// Redirect
// =============================================================================

/// GET /auth/:provider
///
/// Redirects the browser to the provider's consent page.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Redirect (302) with client_id, redirect_uri, scope, state
async fn begin_auth(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let csrf_state = generate_csrf_state();
    let location = state
        .providers
        .begin(&provider, &csrf_state)
        .map_err(|error| match error {
            OAuthError::UnknownProvider(name) => AppError::UnknownProvider(name),
            other => other.into(),
        })?;

    tracing::info!(provider = %provider, "Redirecting to OAuth provider");

    let jar = jar.add(session_cookie(
        &state.config,
        STATE_COOKIE,
        csrf_state,
        STATE_COOKIE_MAX_AGE_SECONDS,
    ));
    Ok((jar, found(&location)).into_response())
}

// =============================================================================
// Callback
// =============================================================================

/// GET /auth/:provider/callback
///
/// Handles the provider redirect.
///
/// # Steps
/// 1. Verify CSRF state against the cookie
/// 2. Exchange code for the user's profile
/// 3. Issue a signed session token
/// 4. Set the legacy session cookie
/// 5. Redirect to the frontend, optionally with the token
async fn auth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let expected_state = jar.get(STATE_COOKIE).map(|cookie| cookie.value().to_owned());
    let provider_label = state
        .providers
        .get(&provider)
        .map(|registered| registered.name().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let identity = match state
        .providers
        .complete(&provider, &params, expected_state.as_deref())
        .await
    {
        Ok(identity) => identity,
        Err(error) => {
            OAUTH_CALLBACKS_TOTAL
                .with_label_values(&[provider_label.as_str(), "failure"])
                .inc();
            tracing::warn!(provider = %provider, %error, "OAuth callback failed");
            return Err(error.into());
        }
    };
    OAUTH_CALLBACKS_TOTAL
        .with_label_values(&[provider_label.as_str(), "success"])
        .inc();

    let token = state.tokens.issue(&identity)?;
    TOKENS_ISSUED_TOTAL
        .with_label_values(&[provider_label.as_str()])
        .inc();

    let max_age = state.config.auth.session_max_age_seconds;
    let session = LegacySession::new(identity.clone(), max_age)?;
    let session_value = create_session_token(&session, state.config.auth.cookie_secret())?;

    tracing::info!(
        user_id = %identity.id,
        email = %identity.email,
        provider = %identity.provider,
        "User authenticated"
    );

    let location = frontend_location(&state.config, &token)?;
    let jar = jar
        .add(session_cookie(&state.config, SESSION_COOKIE, session_value, max_age))
        .add(expired_cookie(&state.config, STATE_COOKIE));

    Ok((jar, found(&location)).into_response())
}

// =============================================================================
// Logout
// =============================================================================

/// GET /auth/logout
///
/// Expires the session and state cookies. Bearer tokens are not affected;
/// clients drop them on their side.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .add(expired_cookie(&state.config, SESSION_COOKIE))
        .add(expired_cookie(&state.config, STATE_COOKIE));

    (
        jar,
        Json(serde_json::json!({
            "message": "Logged out successfully",
        })),
    )
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// 302 Found pointing at `location`
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Post-login frontend URL, carrying the token when configured to
fn frontend_location(config: &AppConfig, token: &str) -> Result<String, AppError> {
    let mut url = Url::parse(&config.frontend_redirect_url())
        .map_err(|e| AppError::Config(format!("invalid frontend redirect URL: {e}")))?;
    if config.auth.embed_token_in_redirect {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url.to_string())
}

fn session_cookie(
    config: &AppConfig,
    name: &'static str,
    value: String,
    max_age_seconds: i64,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_seconds))
        .build()
}

/// Cookie that tells the browser to drop `name` immediately
fn expired_cookie(config: &AppConfig, name: &'static str) -> Cookie<'static> {
    session_cookie(config, name, String::new(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        let mut vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        vars.insert("JWT_SECRET_KEY".to_string(), "secret".to_string());
        AppConfig::load_from(vars).unwrap()
    }

    #[test]
    fn csrf_states_are_random_and_url_safe() {
        let first = generate_csrf_state();
        let second = generate_csrf_state();
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn frontend_location_embeds_token_by_default() {
        let location = frontend_location(&config(&[]), "a.b.c").unwrap();
        assert_eq!(location, "http://localhost:3000/auth/callback?token=a.b.c");
    }

    #[test]
    fn frontend_location_can_omit_token() {
        let config = config(&[("SESSIONGATE__AUTH__EMBED_TOKEN_IN_REDIRECT", "false")]);
        let location = frontend_location(&config, "a.b.c").unwrap();
        assert_eq!(location, "http://localhost:3000/auth/callback");
    }

    #[test]
    fn cookies_are_secure_in_production() {
        let config = config(&[("ENV", "production")]);
        let cookie = session_cookie(&config, SESSION_COOKIE, "v".to_string(), 60);
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn expired_cookie_has_zero_max_age() {
        let cookie = expired_cookie(&config(&[]), STATE_COOKIE);
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        assert_eq!(cookie.value(), "");
    }
}
