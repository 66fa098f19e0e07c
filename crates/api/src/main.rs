use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tether_api::auth::StaticAuthenticator;
use tether_api::config::ServerConfig;
use tether_api::engine::geofence::LoggingGeofence;
use tether_api::router::build_app_router;
use tether_api::state::AppState;
use tether_db::{MemoryStore, PgStore, Store};
use tether_events::EventBus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Failed to load server configuration")?;

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tether_api=debug,tower_http=debug".into()),
        )
        .with(config.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!config.log_json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Store ---
    let store = build_store(&config).await?;

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::new());

    // --- App state ---
    let authenticator = Arc::new(StaticAuthenticator::new(
        config.jwt.clone(),
        &config.device_api_keys,
    ));
    tracing::info!(
        device_keys = config.device_api_keys.len(),
        "Authenticator configured"
    );

    let state = AppState::new(
        config.clone(),
        store,
        Arc::clone(&event_bus),
        authenticator,
        Arc::new(LoggingGeofence),
    );

    let app = build_app_router(state, &config);

    // --- Start server ---
    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let ws_count = event_bus.connection_count().await;
    tracing::info!(ws_count, "Closing remaining push connections");
    let cleanup = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        event_bus.shutdown_all(),
    )
    .await;
    if cleanup.is_err() {
        tracing::warn!("Timed out closing push connections");
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Connect to Postgres when `DATABASE_URL` is set, otherwise fall back to the
/// in-memory store.
async fn build_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn Store>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory store (data is not persisted)");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = tether_db::create_pool(database_url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    tether_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    tether_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(Arc::new(PgStore::new(pool)))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
