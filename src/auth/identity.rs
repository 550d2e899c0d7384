//! Authenticated user identity

use serde::{Deserialize, Serialize};

use super::token::Claims;

/// Profile attributes returned by an OAuth provider
///
/// Lives only for the duration of the callback request and inside
/// signed tokens; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-scoped user ID
    pub id: String,
    pub email: String,
    /// Display name
    pub name: String,
    pub avatar_url: String,
    /// Provider name (e.g., "google")
    pub provider: String,
}

/// Public user representation returned by `/api/user` and `/api/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: String,
    pub provider: String,
}

impl From<&Identity> for UserResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            avatar: identity.avatar_url.clone(),
            provider: identity.provider.clone(),
        }
    }
}

impl From<&Claims> for UserResponse {
    fn from(claims: &Claims) -> Self {
        Self {
            id: claims.id.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            avatar: claims.avatar.clone(),
            provider: claims.provider.clone(),
        }
    }
}
