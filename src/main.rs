//! Sessiongate binary entry point

use sessiongate::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load .env (outside production), then configuration from files and environment
/// 2. Initialize tracing/logging from the `logging` section
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration; logging needs it, so outcomes are reported after init
    let dotenv = config::load_dotenv();
    let loaded = config::AppConfig::load();

    // 2. Initialize tracing/logging
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging);

    tracing::info!("Starting Sessiongate...");
    dotenv.log();

    // A missing signing secret stops the process here
    let config = match loaded {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "Failed to load configuration");
            return Err(error.into());
        }
    };
    config.log_warnings();
    tracing::info!(
        environment = ?config.environment,
        public_url = %config.server.public_url,
        "Configuration loaded"
    );

    // 3. Initialize application state
    let state = AppState::new(config.clone())?;

    for provider in state.providers.names() {
        tracing::info!(
            provider,
            callback_url = %config.callback_url(provider),
            "Registered OAuth callback URL"
        );
    }

    // 4. Build Axum router
    let app = sessiongate::build_router(state);

    // 5. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Install the global subscriber; `RUST_LOG` overrides the configured level
fn init_tracing(logging: &config::LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.env_filter().into());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
