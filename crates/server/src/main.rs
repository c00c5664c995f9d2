//! sosmed server entry point.

use std::sync::Arc;

use sosmed_common::{Config, RedisCache, SharedCache};
use sosmed_server::AppState;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Connect the feed cache, or run without one.
async fn connect_cache(config: &Config) -> Option<SharedCache> {
    let redis = config.redis.as_ref()?;

    info!("Connecting to Redis...");
    match RedisCache::connect(&redis.url).await {
        Ok(cache) => {
            info!(prefix = %redis.prefix, "Connected to Redis");
            Some(Arc::new(cache))
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable, running without feed cache");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sosmed=debug,sosmed_core=debug,sosmed_db=debug,sosmed_common=debug".into()
            }),
        )
        .init();

    info!("Starting sosmed...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = sosmed_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    sosmed_db::migrate(&db).await?;
    info!("Migrations completed");

    let cache = connect_cache(&config).await;
    let cache_enabled = cache.is_some();
    let state = AppState::new(Arc::new(db), cache, &config);

    info!(feed_cache = cache_enabled, "sosmed ready");

    shutdown_signal().await;
    drop(state);

    info!("Shutdown complete");
    Ok(())
}
