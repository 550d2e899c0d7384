//! OAuth provider abstraction
//!
//! Each provider knows how to build its consent-page URL and how to turn
//! an authorization code into an [`Identity`]. The [`ProviderRegistry`]
//! looks providers up by the name used in the route path.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::google::GoogleProvider;
use super::identity::Identity;
use crate::config::AppConfig;

/// OAuth flow failures
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("no provider for {0} exists")]
    UnknownProvider(String),

    #[error("state token mismatch")]
    StateMismatch,

    #[error("authorization code missing from callback")]
    MissingCode,

    #[error("provider returned error: {0}")]
    Denied(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("user info request failed: {0}")]
    UserInfo(String),

    #[error("invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Query parameters delivered to the callback route
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// CSRF state echoed back by the provider
    pub state: Option<String>,
    /// Error code when the user declined or the request was invalid
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// A third-party identity provider
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Name used in `/auth/:provider`
    fn name(&self) -> &str;

    /// Consent-page URL carrying `state`
    fn authorization_url(&self, state: &str) -> Result<String, OAuthError>;

    /// Exchange an authorization code for the user's profile
    async fn exchange(&self, code: &str) -> Result<Identity, OAuthError>;
}

/// Providers available to the router, keyed by name
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every provider the configuration describes
    pub fn from_config(config: &AppConfig, http_client: reqwest::Client) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GoogleProvider::new(
            config.providers.google.clone(),
            config.callback_url(GoogleProvider::NAME),
            http_client,
        )));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) {
        tracing::debug!(provider = provider.name(), "Registered OAuth provider");
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Registered provider names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn OAuthProvider>, OAuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| OAuthError::UnknownProvider(name.to_string()))
    }

    /// Consent-page URL for `provider`
    pub fn begin(&self, provider: &str, state: &str) -> Result<String, OAuthError> {
        self.get(provider)?.authorization_url(state)
    }

    /// Finish the flow for `provider`
    ///
    /// `expected_state` is the value stored when the flow began; the
    /// callback's `state` must match it exactly.
    pub async fn complete(
        &self,
        provider: &str,
        params: &CallbackParams,
        expected_state: Option<&str>,
    ) -> Result<Identity, OAuthError> {
        let provider = self.get(provider)?;

        if let Some(error) = &params.error {
            let detail = match &params.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error.clone(),
            };
            return Err(OAuthError::Denied(detail));
        }

        match (params.state.as_deref(), expected_state) {
            (Some(received), Some(expected)) if received == expected => {}
            _ => return Err(OAuthError::StateMismatch),
        }

        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(OAuthError::MissingCode)?;

        provider.exchange(code).await
    }
}
