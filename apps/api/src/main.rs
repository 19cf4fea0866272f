use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jobboard::analytics::SqlEventLog;
use jobboard::config::Config;
use jobboard::db::{create_pool, Backend};
use jobboard::jobs::memory::demo_jobs;
use jobboard::jobs::SqlJobStore;
use jobboard::routes::build_router;
use jobboard::salary::SqlSalaryLookup;
use jobboard::state::AppState;
use jobboard::submissions::SqlSubmissionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobboard API v{}", env!("CARGO_PKG_VERSION"));

    let state = build_state(&config).await?;
    spawn_cache_eviction(&state, config.cache_settings().ttl);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Wires the stores, salary lookup and event sink for the configured backend.
/// `memory:` serves the demo catalogue without a database.
async fn build_state(config: &Config) -> Result<AppState> {
    let backend = Backend::from_url(&config.database_url)?;
    if backend == Backend::Memory {
        info!("Serving the in-memory demo catalogue");
        return Ok(AppState::in_memory(config.cache_settings())
            .with_analytics_salt(&config.analytics_salt));
    }

    let pool = create_pool(&config.database_url, config.db_pool_max).await?;
    let state = AppState::new(
        Arc::new(SqlJobStore::new(pool.clone(), backend)),
        Arc::new(SqlSalaryLookup::new(pool.clone(), backend)),
        Arc::new(SqlEventLog::new(pool.clone(), backend)),
        Arc::new(SqlSubmissionStore::new(pool, backend)),
        config.cache_settings(),
    )
    .with_analytics_salt(&config.analytics_salt);

    if config.seed_demo_jobs {
        // links are unique, so reseeding an existing database is a no-op
        state.jobs.insert_many(&demo_jobs()).await?;
    }
    Ok(state)
}

/// Periodically drops expired cache entries so idle keys don't linger.
fn spawn_cache_eviction(state: &AppState, ttl: Duration) {
    if ttl.is_zero() {
        return;
    }
    let jobs = state.jobs.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ttl);
        loop {
            ticker.tick().await;
            jobs.evict_expired();
        }
    });
}
