use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use astex::application::AppState;
use astex::auth::{hash_password, TokenAuthority};
use astex::config::AppConfig;
use astex::persistence::init_database;
use astex::persistence::users::UserRepository;
use astex::rate_limit::{create_credential_limiter, CredentialThrottle};
use astex::router::build_router;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astex=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!("Astex brokerage server starting...");

    let pool = init_database(&config.database_url).await?;

    // Make sure the back-office is reachable on a fresh database.
    let admin_hash = hash_password(&config.default_admin_password)
        .map_err(|e| format!("Failed to hash default admin password: {}", e))?;
    UserRepository::new(pool.clone())
        .seed_default_admin(&admin_hash)
        .await?;

    let tokens = TokenAuthority::new(config.jwt_secret.clone(), config.token_ttl_hours);
    let state = AppState::new(pool, tokens);

    let limiter = create_credential_limiter(CredentialThrottle {
        attempts_per_minute: config.rate_limit_per_minute,
    });

    let app = build_router(state, limiter);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Shutdown complete");
    Ok(())
}
