// ============================================================================
// Pairchat Server
// ============================================================================
//
// Realtime one-to-one messaging core:
// - registry.rs    - live sessions and conversation rooms
// - router.rs      - joinApp / joinPrivateChat / sendPrivateMessage
// - hot_cache.rs   - newest messages per conversation (Redis zset)
// - summary.rs     - per-user conversation lists, unseen counters (Redis)
// - store.rs       - durable conversations and messages (Postgres)
// - persistence/   - background drain of hot caches into the store
// - history.rs     - merged hot + durable history, conversation list
// - handlers/      - websocket session loop and event dispatch
// - routes/        - HTTP API
//
// ============================================================================

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod auth;
pub mod context;
pub mod handlers;
pub mod history;
pub mod hot_cache;
pub mod media;
pub mod pagination;
pub mod persistence;
pub mod profiles;
pub mod registry;
pub mod router;
pub mod routes;
pub mod store;
pub mod summary;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use auth::JwtValidator;
use context::{AppContext, Backends, InfraHealth};
use hot_cache::RedisHotCache;
use media::DiskMediaStorage;
use pairchat_config::Config;
use pairchat_redis::RedisClient;
use persistence::RedisJobQueue;
use profiles::CachedProfileDirectory;
use store::PostgresMessageStore;
use summary::RedisSummaryCache;
use utils::mask_url_credentials;

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Load config, connect the stores, start the persistence workers and serve
/// HTTP + websocket traffic until ctrl-c.
pub async fn run() -> Result<()> {
    let config = Arc::new(Config::from_env()?);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Pairchat Server Starting ===");
    info!("Bind address: {}", config.bind_address);

    info!("Connecting to database...");
    let db_pool = pairchat_db::create_pool(&config.database_url, &config.db)
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Connected to database");

    info!(
        "Connecting to Redis at {}...",
        mask_url_credentials(&config.redis_url)
    );
    let redis = tokio::time::timeout(
        REDIS_CONNECT_TIMEOUT,
        RedisClient::connect(&config.redis_url),
    )
    .await
    .context("Timed out connecting to Redis")?
    .context("Failed to connect to Redis")?;
    info!("Connected to Redis");

    let prefixes = config.redis_key_prefixes.clone();
    let backends = Backends {
        hot: Arc::new(RedisHotCache::new(
            redis.clone(),
            prefixes.clone(),
            config.cache.read_marker_ttl_secs,
        )),
        summaries: Arc::new(RedisSummaryCache::new(
            redis.clone(),
            prefixes.clone(),
            config.cache.max_conversations,
        )),
        store: Arc::new(PostgresMessageStore::new(db_pool.clone())),
        profiles: Arc::new(CachedProfileDirectory::new(
            redis.clone(),
            db_pool.clone(),
            prefixes.user.clone(),
            config.cache.profile_cache_ttl_secs,
        )),
        queue: Arc::new(RedisJobQueue::new(
            redis.clone(),
            prefixes,
            config.worker.job_dedup_ttl_secs,
        )),
    };

    let context = Arc::new(AppContext::new(
        config.clone(),
        backends,
        Arc::new(JwtValidator::new(&config.jwt_secret)),
        Arc::new(DiskMediaStorage::new(&config.media)),
        Arc::new(InfraHealth {
            db_pool,
            redis,
        }),
    ));

    let worker = context.persistence_worker();
    if let Err(e) = worker.recover_staged().await {
        tracing::error!(error = %e, "Failed to scan for interrupted drains");
    }
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handles = worker.spawn(shutdown_rx);
    info!(
        workers = worker_handles.len(),
        threshold = config.cache.hot_cache_threshold,
        "Persistence workers running"
    );

    let app = routes::create_router(context);
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .context("Failed to bind to address")?;
    info!("Pairchat server listening on {}", config.bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down persistence workers...");
    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
