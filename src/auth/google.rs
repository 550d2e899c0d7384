//! Google OAuth provider

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::identity::Identity;
use super::provider::{OAuthError, OAuthProvider};
use crate::config::GoogleOAuthConfig;

/// Google token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Google user info
///
/// The v2 endpoint reports `id`, the OpenID Connect endpoint `sub`.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: Option<String>,
    sub: Option<String>,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
}

/// Authorization-code flow against Google
pub struct GoogleProvider {
    config: GoogleOAuthConfig,
    redirect_uri: String,
    http_client: reqwest::Client,
}

impl GoogleProvider {
    pub const NAME: &'static str = "google";

    pub fn new(config: GoogleOAuthConfig, redirect_uri: String, http_client: reqwest::Client) -> Self {
        Self {
            config,
            redirect_uri,
            http_client,
        }
    }

    async fn fetch_access_token(&self, code: &str) -> Result<String, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Google token endpoint rejected code");
            return Err(OAuthError::TokenExchange(format!(
                "provider responded with status {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::TokenExchange(format!("unreadable response: {e}")))?;
        Ok(token.access_token)
    }

    async fn fetch_user(&self, access_token: &str) -> Result<GoogleUser, OAuthError> {
        let response = self
            .http_client
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Google user info request failed");
            return Err(OAuthError::UserInfo(format!(
                "provider responded with status {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::UserInfo(format!("unreadable response: {e}")))
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn authorization_url(&self, state: &str) -> Result<String, OAuthError> {
        let mut url = Url::parse(&self.config.auth_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);
        Ok(url.to_string())
    }

    async fn exchange(&self, code: &str) -> Result<Identity, OAuthError> {
        let access_token = self.fetch_access_token(code).await?;
        let user = self.fetch_user(&access_token).await?;

        let id = user
            .id
            .or(user.sub)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| OAuthError::UserInfo("response has no user ID".to_string()))?;

        Ok(Identity {
            id,
            email: user.email,
            name: user.name,
            avatar_url: user.picture,
            provider: Self::NAME.to_string(),
        })
    }
}
