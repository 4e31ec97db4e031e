use std::sync::Arc;

use pairplan_core::config::{AppConfig, RateLimitBackend};
use pairplan_core::{Clock, RateLimitStore, SystemClock};
use pairplan_quota::{FixedWindowLimiter, MemoryRateLimitStore};
use pairplan_server::{AppState, build_router};
use pairplan_storage_sqlite::{
    SqliteLinkageStore, SqliteRateLimitStore, SqliteUsageStore, connect_pool,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/pairplan.toml".to_string());
    let config = AppConfig::load(&config_path)?;

    init_tracing(config.logging.json);
    tracing::info!(config_path = %config_path, "configuration loaded");

    // The default database URL points into data/.
    std::fs::create_dir_all("data")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let pool = connect_pool(&config.database.url).await?;
    let linkage_store = SqliteLinkageStore::from_pool(pool.clone());
    let usage_store = SqliteUsageStore::from_pool(pool.clone());

    let rate_limit_store: Arc<dyn RateLimitStore> = match config.rate_limit.backend {
        RateLimitBackend::Memory => {
            Arc::new(MemoryRateLimitStore::new(config.rate_limit.memory_capacity))
        }
        RateLimitBackend::Sqlite => {
            let store = SqliteRateLimitStore::from_pool(pool);
            let pruned = store.prune_expired(clock.now()).await?;
            tracing::info!(pruned, "cleared elapsed rate limit windows");
            Arc::new(store)
        }
    };
    tracing::info!(backend = ?config.rate_limit.backend, "rate limiter ready");

    let state = AppState {
        linkage_store: Arc::new(linkage_store),
        usage_store: Arc::new(usage_store),
        rate_limiter: FixedWindowLimiter::new(rate_limit_store, clock.clone()),
        clock,
        config: Arc::new(config),
    };

    let addr = format!("0.0.0.0:{}", state.config.port);
    let router = build_router(state);

    tracing::info!("pairplan starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("pairplan stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
