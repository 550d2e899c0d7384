//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (SESSIONGATE__SECTION__KEY)
//! 4. Legacy flat variables (ENV, GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET, JWT_SECRET_KEY)
//!
//! Outside production a `.env` file in the working directory is loaded
//! into the process environment first.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::AppError;

/// Flat environment variables understood for compatibility with existing
/// deployments, mapped onto their structured configuration keys.
const LEGACY_ENV_VARS: &[(&str, &str)] = &[
    ("ENV", "environment"),
    ("GOOGLE_CLIENT_ID", "providers.google.client_id"),
    ("GOOGLE_CLIENT_SECRET", "providers.google.client_secret"),
    ("JWT_SECRET_KEY", "auth.jwt_secret"),
];

const MIN_JWT_SECRET_BYTES: usize = 32;

/// Upper bound for token and session lifetimes (10 years)
const MAX_LIFETIME_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: RuntimeEnv,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub providers: ProvidersConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

/// Deployment environment
///
/// Anything other than exactly `production` is development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RuntimeEnv {
    Development,
    Production,
}

impl From<String> for RuntimeEnv {
    fn from(value: String) -> Self {
        if value == "production" {
            RuntimeEnv::Production
        } else {
            RuntimeEnv::Development
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Externally reachable base URL, used to build OAuth callback addresses
    pub public_url: String,
}

/// Session token and cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret shared by the token issuer and verifier
    #[serde(default)]
    pub jwt_secret: String,
    /// Secret for the legacy session cookie (falls back to `jwt_secret`)
    pub session_secret: Option<String>,
    /// Bearer token lifetime in seconds (default: 604800 = 7 days)
    pub token_ttl_seconds: i64,
    /// Legacy session cookie lifetime in seconds (default: 2592000 = 30 days)
    pub session_max_age_seconds: i64,
    /// Frontend origin the browser is sent back to after sign-in
    pub frontend_url: String,
    /// Path on the frontend that receives the post-login redirect
    pub frontend_callback_path: String,
    /// Append `?token=<jwt>` to the post-login redirect
    pub embed_token_in_redirect: bool,
    /// Timeout for calls to provider token and user-info endpoints
    pub provider_timeout_seconds: u64,
}

impl AuthConfig {
    /// Secret used to sign the legacy session cookie
    pub fn cookie_secret(&self) -> &str {
        self.session_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .unwrap_or(&self.jwt_secret)
    }
}

/// Registered OAuth providers
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub google: GoogleOAuthConfig,
}

/// Google OAuth configuration
///
/// Endpoints default to Google's production URLs and only need to be set
/// when pointing at a stand-in server.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
}

/// Cross-origin policy
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to make credentialed cross-origin requests
    pub allowed_origins: Vec<String>,
    /// Preflight cache duration in seconds (default: 43200 = 12h)
    pub max_age_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Filter directives used when `RUST_LOG` is unset
    ///
    /// Request spans from `tower_http` are emitted at debug and stay visible.
    pub fn env_filter(&self) -> String {
        format!("sessiongate={},tower_http=debug", self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and process environment
    ///
    /// Run [`load_dotenv`] first so `.env` entries are visible.
    ///
    /// # Errors
    /// Returns error if configuration is invalid or the signing secret
    /// is missing
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(std::env::vars().collect())
    }

    /// Load configuration using `vars` in place of the process environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. SESSIONGATE__* variables
    /// 5. Legacy flat variables
    pub fn load_from(vars: HashMap<String, String>) -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.public_url", "http://localhost:8080")?
            .set_default("auth.token_ttl_seconds", 604_800)?
            .set_default("auth.session_max_age_seconds", 2_592_000)?
            .set_default("auth.frontend_url", "http://localhost:3000")?
            .set_default("auth.frontend_callback_path", "/auth/callback")?
            .set_default("auth.embed_token_in_redirect", true)?
            .set_default("auth.provider_timeout_seconds", 10)?
            .set_default(
                "providers.google.auth_url",
                "https://accounts.google.com/o/oauth2/v2/auth",
            )?
            .set_default(
                "providers.google.token_url",
                "https://oauth2.googleapis.com/token",
            )?
            .set_default(
                "providers.google.userinfo_url",
                "https://www.googleapis.com/oauth2/v2/userinfo",
            )?
            .set_default("providers.google.scopes", vec!["openid", "email", "profile"])?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("cors.max_age_seconds", 43_200)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SESSIONGATE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("providers.google.scopes")
                    .try_parsing(true)
                    .source(Some(vars.clone())),
            );

        for (var, key) in LEGACY_ENV_VARS {
            let value = vars
                .get(*var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let app_config: Self = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == RuntimeEnv::Production
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.is_production() || self.server.public_url.starts_with("https://")
    }

    /// Callback address registered with the provider
    pub fn callback_url(&self, provider: &str) -> String {
        format!(
            "{}/auth/{}/callback",
            self.server.public_url.trim_end_matches('/'),
            provider
        )
    }

    /// Where the browser lands after a completed sign-in
    pub fn frontend_redirect_url(&self) -> String {
        format!(
            "{}{}",
            self.auth.frontend_url.trim_end_matches('/'),
            self.auth.frontend_callback_path
        )
    }

    /// Configured origins, plus the frontend origin in production
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = self
            .cors
            .allowed_origins
            .iter()
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        if self.is_production() {
            if let Ok(url) = url::Url::parse(&self.auth.frontend_url) {
                let origin = url.origin().ascii_serialization();
                if !origins.contains(&origin) {
                    origins.push(origin);
                }
            }
        }

        origins
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(AppError::Config(
                "JWT_SECRET_KEY environment variable is not set".to_string(),
            ));
        }

        for (key, value) in [
            ("auth.token_ttl_seconds", self.auth.token_ttl_seconds),
            ("auth.session_max_age_seconds", self.auth.session_max_age_seconds),
        ] {
            if !(1..=MAX_LIFETIME_SECONDS).contains(&value) {
                return Err(AppError::Config(format!(
                    "{key} must be between 1 and {MAX_LIFETIME_SECONDS}"
                )));
            }
        }

        for (key, value) in [
            ("server.public_url", &self.server.public_url),
            ("auth.frontend_url", &self.auth.frontend_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("{key} is not a valid URL: {e}")))?;
        }

        Ok(())
    }

    /// Warn about settings that load fine but weaken or disable sign-in
    ///
    /// Called once logging is initialized.
    pub fn log_warnings(&self) {
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            tracing::warn!(
                min_bytes = MIN_JWT_SECRET_BYTES,
                "JWT secret is shorter than recommended"
            );
        }

        let google = &self.providers.google;
        if google.client_id.is_empty() || google.client_secret.is_empty() {
            tracing::warn!("Google OAuth client credentials are not configured");
        }

        if !self.should_use_secure_cookies() {
            tracing::warn!(
                public_url = %self.server.public_url,
                "Using insecure cookies for local development"
            );
        }
    }
}

/// Result of looking for a development `.env` file
#[derive(Debug)]
pub enum DotenvStatus {
    /// `ENV=production`; the file is never read
    Skipped,
    Loaded(PathBuf),
    NotFound,
    Failed(String),
}

impl DotenvStatus {
    /// Report the outcome; none of them stop startup
    pub fn log(&self) {
        match self {
            DotenvStatus::Skipped => {}
            DotenvStatus::Loaded(path) => {
                tracing::info!(path = %path.display(), "Loaded .env overrides")
            }
            DotenvStatus::NotFound => {
                tracing::info!("No .env file found, using system environment variables")
            }
            DotenvStatus::Failed(error) => {
                tracing::warn!(%error, "Failed to load .env file, using system environment variables")
            }
        }
    }
}

/// Load `.env` into the process environment unless running in production
///
/// Runs before logging is initialized, so the outcome is returned for the
/// caller to log.
pub fn load_dotenv() -> DotenvStatus {
    let production = std::env::var("ENV")
        .map(|value| RuntimeEnv::from(value) == RuntimeEnv::Production)
        .unwrap_or(false);
    if production {
        return DotenvStatus::Skipped;
    }

    match dotenvy::dotenv() {
        Ok(path) => DotenvStatus::Loaded(path),
        Err(error) if error.not_found() => DotenvStatus::NotFound,
        Err(error) => DotenvStatus::Failed(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn load_fails_without_signing_secret() {
        let error = AppConfig::load_from(vars(&[("GOOGLE_CLIENT_ID", "id")]))
            .expect_err("missing JWT secret must fail");
        assert!(matches!(
            error,
            AppError::Config(message) if message.contains("JWT_SECRET_KEY")
        ));
    }

    #[test]
    fn load_rejects_blank_signing_secret() {
        let error = AppConfig::load_from(vars(&[("JWT_SECRET_KEY", "   ")]))
            .expect_err("blank JWT secret must fail");
        assert!(matches!(error, AppError::Config(_)));
    }

    #[test]
    fn legacy_variables_are_mapped() {
        let config = AppConfig::load_from(vars(&[
            ("ENV", "production"),
            ("GOOGLE_CLIENT_ID", "google-id"),
            ("GOOGLE_CLIENT_SECRET", "google-secret"),
            ("JWT_SECRET_KEY", "a-very-long-signing-secret-for-tests"),
        ]))
        .expect("config loads");

        assert!(config.is_production());
        assert_eq!(config.providers.google.client_id, "google-id");
        assert_eq!(config.providers.google.client_secret, "google-secret");
        assert_eq!(config.auth.jwt_secret, "a-very-long-signing-secret-for-tests");
        assert!(config.should_use_secure_cookies());
    }

    #[test]
    fn defaults_apply() {
        let config = AppConfig::load_from(vars(&[("JWT_SECRET_KEY", "secret")]))
            .expect("config loads");

        assert_eq!(config.environment, RuntimeEnv::Development);
        assert_eq!(config.auth.token_ttl_seconds, 7 * 24 * 60 * 60);
        assert_eq!(config.auth.session_max_age_seconds, 30 * 24 * 60 * 60);
        assert_eq!(config.cors.max_age_seconds, 12 * 60 * 60);
        assert_eq!(config.providers.google.scopes.len(), 3);
        assert_eq!(config.auth.cookie_secret(), "secret");
    }

    #[test]
    fn prefixed_variables_override_defaults() {
        let config = AppConfig::load_from(vars(&[
            ("JWT_SECRET_KEY", "secret"),
            ("SESSIONGATE__SERVER__PORT", "9090"),
            (
                "SESSIONGATE__CORS__ALLOWED_ORIGINS",
                "http://localhost:3000,http://localhost:5173",
            ),
        ]))
        .expect("config loads");

        assert_eq!(config.server.port, 9090);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["http://localhost:3000", "http://localhost:5173"]
        );
    }

    #[test]
    fn production_adds_frontend_origin_to_cors() {
        let config = AppConfig::load_from(vars(&[
            ("ENV", "production"),
            ("JWT_SECRET_KEY", "secret"),
            ("SESSIONGATE__AUTH__FRONTEND_URL", "https://app.example.com/"),
        ]))
        .expect("config loads");

        assert_eq!(
            config.cors_origins(),
            vec!["http://localhost:3000", "https://app.example.com"]
        );
        assert_eq!(
            config.frontend_redirect_url(),
            "https://app.example.com/auth/callback"
        );
    }

    #[test]
    fn development_keeps_configured_origins_only() {
        let config = AppConfig::load_from(vars(&[("JWT_SECRET_KEY", "secret")]))
            .expect("config loads");
        assert_eq!(config.cors_origins(), vec!["http://localhost:3000"]);
    }

    #[test]
    fn callback_url_uses_public_url() {
        let config = AppConfig::load_from(vars(&[
            ("JWT_SECRET_KEY", "secret"),
            ("SESSIONGATE__SERVER__PUBLIC_URL", "https://auth.example.com/"),
        ]))
        .expect("config loads");
        assert_eq!(
            config.callback_url("google"),
            "https://auth.example.com/auth/google/callback"
        );
    }

    #[test]
    fn runtime_env_matches_production_exactly() {
        assert_eq!(
            RuntimeEnv::from("production".to_string()),
            RuntimeEnv::Production
        );
        assert_eq!(
            RuntimeEnv::from("Production".to_string()),
            RuntimeEnv::Development
        );
        assert_eq!(RuntimeEnv::from("staging".to_string()), RuntimeEnv::Development);
    }

    #[test]
    fn load_rejects_out_of_range_lifetimes() {
        for (key, value) in [
            ("SESSIONGATE__AUTH__TOKEN_TTL_SECONDS", "9000000000000"),
            ("SESSIONGATE__AUTH__SESSION_MAX_AGE_SECONDS", "9000000000000"),
            ("SESSIONGATE__AUTH__TOKEN_TTL_SECONDS", "0"),
        ] {
            let error = AppConfig::load_from(vars(&[("JWT_SECRET_KEY", "secret"), (key, value)]))
                .expect_err("out-of-range lifetime must fail");
            assert!(
                matches!(&error, AppError::Config(message) if message.contains("must be between")),
                "{key}={value}: {error}"
            );
        }
    }

    #[test]
    fn logging_section_is_configurable() {
        let config = AppConfig::load_from(vars(&[
            ("JWT_SECRET_KEY", "secret"),
            ("SESSIONGATE__LOGGING__FORMAT", "json"),
            ("SESSIONGATE__LOGGING__LEVEL", "debug"),
        ]))
        .expect("config loads");

        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.env_filter(), "sessiongate=debug,tower_http=debug");
    }
}
