//! Common test utilities for E2E tests

#![allow(dead_code)]

use sessiongate::auth::Identity;
use sessiongate::{AppState, config};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_SECRET: &str = "test-secret-key-32-bytes-long!!!";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub client: reqwest::Client,
    /// Stand-in for Google's token and user-info endpoints
    pub google: MockServer,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server after adjusting the default test configuration
    pub async fn with_config(customize: impl FnOnce(&mut config::AppConfig)) -> Self {
        let google = MockServer::start().await;

        let mut config = test_config(&google.uri());
        customize(&mut config);

        // Initialize app state
        let state = AppState::new(config).unwrap();

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = sessiongate::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            client,
            google,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Issue a valid bearer token for [`test_identity`]
    pub fn create_test_token(&self) -> String {
        self.state
            .tokens
            .issue(&test_identity())
            .expect("Failed to create test token")
    }

    /// Make the Google stand-in accept `code` and return [`test_identity`]
    pub async fn mock_google_sign_in(&self, code: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(wiremock::matchers::body_string_contains(format!("code={code}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "google-access-token",
                "token_type": "Bearer",
                "expires_in": 3599,
            })))
            .mount(&self.google)
            .await;

        let identity = test_identity();
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": identity.id,
                "email": identity.email,
                "verified_email": true,
                "name": identity.name,
                "picture": identity.avatar_url,
            })))
            .mount(&self.google)
            .await;
    }
}

/// Configuration pointing the Google provider at `google_base`
pub fn test_config(google_base: &str) -> config::AppConfig {
    config::AppConfig {
        environment: config::RuntimeEnv::Development,
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            public_url: "http://localhost:8080".to_string(),
        },
        auth: config::AuthConfig {
            jwt_secret: TEST_SECRET.to_string(),
            session_secret: None,
            token_ttl_seconds: 604_800,
            session_max_age_seconds: 2_592_000,
            frontend_url: "http://localhost:3000".to_string(),
            frontend_callback_path: "/auth/callback".to_string(),
            embed_token_in_redirect: true,
            provider_timeout_seconds: 5,
        },
        providers: config::ProvidersConfig {
            google: config::GoogleOAuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: format!("{google_base}/token"),
                userinfo_url: format!("{google_base}/userinfo"),
                scopes: vec![
                    "openid".to_string(),
                    "email".to_string(),
                    "profile".to_string(),
                ],
            },
        },
        cors: config::CorsConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            max_age_seconds: 43_200,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Identity the Google stand-in reports
pub fn test_identity() -> Identity {
    Identity {
        id: "108234567890123456789".to_string(),
        email: "testuser@example.com".to_string(),
        name: "Test User".to_string(),
        avatar_url: "https://example.com/avatar.png".to_string(),
        provider: "google".to_string(),
    }
}

/// All Set-Cookie header values of `response`
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// Value of cookie `name` set by `response`
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response).into_iter().find_map(|header| {
        header
            .split(';')
            .next()
            .and_then(|pair| pair.strip_prefix(&prefix))
            .map(ToString::to_string)
    })
}

/// Location header of a redirect
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}
