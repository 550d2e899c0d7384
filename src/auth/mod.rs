//! OAuth authentication
//!
//! Handles:
//! - Provider sign-in flow (redirect and callback)
//! - Session token issuance and verification
//! - Bearer-token middleware
//! - Legacy cookie sessions

mod google;
pub mod identity;
mod middleware;
mod oauth;
pub mod provider;
pub mod session;
pub mod token;

pub use google::GoogleProvider;
pub use identity::{Identity, UserResponse};
pub use middleware::{AuthenticatedUser, require_bearer};
pub use oauth::{STATE_COOKIE, auth_router};
pub use provider::{CallbackParams, OAuthError, OAuthProvider, ProviderRegistry};
pub use session::{LegacySession, SESSION_COOKIE, create_session_token, verify_session_token};
pub use token::{Claims, TokenError, TokenIssuer};
