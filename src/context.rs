use async_trait::async_trait;
use pairchat_config::Config;
use pairchat_db::DbPool;
use pairchat_redis::RedisClient;
use std::sync::Arc;

use crate::auth::CredentialValidator;
use crate::history::HistoryReader;
use crate::hot_cache::HotCache;
use crate::media::MediaStorage;
use crate::persistence::{JobQueue, PersistenceWorker};
use crate::profiles::ProfileDirectory;
use crate::registry::ConnectionRegistry;
use crate::router::MessageRouter;
use crate::store::MessageStore;
use crate::summary::SummaryCache;

/// Storage seams shared by the router, the history reader and the worker
#[derive(Clone)]
pub struct Backends {
    pub hot: Arc<dyn HotCache>,
    pub summaries: Arc<dyn SummaryCache>,
    pub store: Arc<dyn MessageStore>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub queue: Arc<dyn JobQueue>,
}

/// Readiness probe for the stores behind the server
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> anyhow::Result<()>;
}

/// Postgres + Redis round trips
pub struct InfraHealth {
    pub db_pool: DbPool,
    pub redis: RedisClient,
}

#[async_trait]
impl HealthCheck for InfraHealth {
    async fn check(&self) -> anyhow::Result<()> {
        pairchat_db::ping(&self.db_pool).await?;
        let mut redis = self.redis.clone();
        redis.ping().await?;
        Ok(())
    }
}

/// Application context containing shared dependencies
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub registry: Arc<ConnectionRegistry>,
    pub router: Arc<MessageRouter>,
    pub history: Arc<HistoryReader>,
    pub validator: Arc<dyn CredentialValidator>,
    pub media: Arc<dyn MediaStorage>,
    pub health: Arc<dyn HealthCheck>,
    pub backends: Backends,
}

impl AppContext {
    /// Wire the registry, history reader and router over `backends`
    pub fn new(
        config: Arc<Config>,
        backends: Backends,
        validator: Arc<dyn CredentialValidator>,
        media: Arc<dyn MediaStorage>,
        health: Arc<dyn HealthCheck>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let history = Arc::new(HistoryReader::new(&backends));
        let router = Arc::new(MessageRouter::new(
            registry.clone(),
            &backends,
            history.clone(),
            config.cache.clone(),
            config.logging.clone(),
        ));
        Self {
            config,
            registry,
            router,
            history,
            validator,
            media,
            health,
            backends,
        }
    }

    /// Persistence worker over the same backends
    pub fn persistence_worker(&self) -> PersistenceWorker {
        PersistenceWorker::new(
            self.backends.hot.clone(),
            self.backends.store.clone(),
            self.backends.queue.clone(),
            self.config.worker.clone(),
            self.config.cache.hot_cache_threshold,
        )
    }
}
