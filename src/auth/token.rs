//! Session token issuance and verification
//!
//! Tokens are compact JWS strings signed with HMAC-SHA256. Nothing is
//! stored server-side: a token is valid while its signature checks out
//! and its `exp` lies in the future.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::identity::Identity;

/// Algorithms accepted on verification. Anything outside the HMAC family
/// is refused before the signature is looked at.
const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Provider-scoped user ID
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: String,
    pub provider: String,
    /// Expiration as Unix timestamp (seconds)
    pub exp: i64,
}

impl Claims {
    /// Build claims for `identity` expiring at `expires_at`
    pub fn for_identity(identity: &Identity, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            avatar: identity.avatar_url.clone(),
            provider: identity.provider.clone(),
            exp: expires_at.timestamp(),
        }
    }
}

/// Token failures
///
/// Everything except `Signing` and `ExpiryOutOfRange` is a rejection of
/// caller-supplied input.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("unexpected signing method: {0}")]
    UnexpectedAlgorithm(String),

    #[error("Invalid token: {0}")]
    Malformed(String),

    #[error("Failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("token lifetime exceeds the supported date range")]
    ExpiryOutOfRange,
}

impl TokenError {
    /// True when the token was refused rather than the server failing
    pub fn is_rejection(&self) -> bool {
        !matches!(self, TokenError::Signing(_) | TokenError::ExpiryOutOfRange)
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => TokenError::UnexpectedAlgorithm("unknown".to_string()),
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Issues and verifies session tokens with one shared secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer for `secret` whose tokens live for `ttl_seconds`
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::try_seconds(ttl_seconds).unwrap_or(Duration::MAX),
        }
    }

    /// Sign a token for `identity`, valid from now for the configured TTL
    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    /// Sign a token as though it was issued at `issued_at`
    pub fn issue_at(
        &self,
        identity: &Identity,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let claims = Claims::for_identity(identity, expires_at);
        self.sign(&claims)
    }

    /// Sign arbitrary claims with HS256
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Verify signature, algorithm family and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        // Inspect the header first so a non-HMAC token is reported as such
        // instead of as a generic decoding failure.
        let header = decode_header(token)?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            return Err(TokenError::UnexpectedAlgorithm(format!("{:?}", header.alg)));
        }

        let mut validation = Validation::new(header.alg);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        // `exp` equal to now is treated as expired; the library only
        // rejects strictly past timestamps.
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}
