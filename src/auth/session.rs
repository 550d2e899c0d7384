//! Legacy cookie session
//!
//! Uses HMAC-signed tokens stored in the `session` cookie.
//! No server-side session storage needed.
//!
//! Deprecated in favour of bearer tokens; kept so `/api/me` keeps
//! working for clients that have not moved to `/api/user`.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::identity::Identity;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Cookie holding the legacy session
pub const SESSION_COOKIE: &str = "session";

/// Cookie-backed session data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacySession {
    pub identity: Identity,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl LegacySession {
    /// Start a session for `identity` lasting `max_age_seconds`
    pub fn new(identity: Identity, max_age_seconds: i64) -> Result<Self, AppError> {
        let now = Utc::now();
        let expires_at = Duration::try_seconds(max_age_seconds)
            .and_then(|max_age| now.checked_add_signed(max_age))
            .ok_or_else(|| {
                AppError::Config("session lifetime exceeds the supported date range".to_string())
            })?;

        Ok(Self {
            identity,
            created_at: now,
            expires_at,
        })
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

fn mac_for(secret: &str, payload_b64: &str) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    Ok(mac)
}

/// Create a signed session cookie value
///
/// Format: base64(payload).base64(hmac_sha256(payload))
pub fn create_session_token(session: &LegacySession, secret: &str) -> Result<String, AppError> {
    let payload = serde_json::to_string(session).map_err(|e| AppError::Internal(e.into()))?;
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    let signature = mac_for(secret, &payload_b64)?.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a session cookie value
///
/// # Errors
/// Returns `Unauthorized` if the value is malformed, the signature does
/// not match, or the session has expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<LegacySession, AppError> {
    let not_authenticated = || AppError::unauthorized("Not authenticated");

    let (payload_b64, signature_b64) = token.split_once('.').ok_or_else(not_authenticated)?;
    if signature_b64.contains('.') {
        return Err(not_authenticated());
    }

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| not_authenticated())?;
    mac_for(secret, payload_b64)?
        .verify_slice(&signature)
        .map_err(|_| not_authenticated())?;

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| not_authenticated())?;
    let session: LegacySession =
        serde_json::from_slice(&payload).map_err(|_| not_authenticated())?;

    if session.is_expired() {
        return Err(not_authenticated());
    }

    Ok(session)
}
