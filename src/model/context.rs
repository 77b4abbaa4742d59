use std::sync::Arc;
use tracing::info;
use super::{Clock, Repository, SystemClock};
use crate::cache::CacheProvider;
use crate::config::ModelConfig;
use crate::connection::Driver;
use crate::connection::config::ConnectionConfig;
use crate::connection::pool::ConnectionPool;
use crate::core::{EntitySchema, ModelError, Result};

/// Shared state for every repository: the connection pool, the cache and the clock.
///
/// Built once at startup and passed to repositories explicitly, so several
/// contexts (for example one per test) can coexist. Nothing in it changes
/// after construction; in particular the cache backend cannot be swapped.
pub struct ModelContext {
    pool: Option<ConnectionPool>,
    cache: CacheProvider,
    clock: Arc<dyn Clock>,
}

impl ModelContext {
    pub fn builder() -> ModelContextBuilder {
        ModelContextBuilder::default()
    }

    /// Builds the pool and the cache backend described by `config`.
    pub async fn from_config(config: &ModelConfig, driver: Arc<dyn Driver>) -> Result<Arc<Self>> {
        let driver_name = driver.name().to_string();
        let pool = ConnectionPool::new(ConnectionConfig::from(&config.pool), driver).await?;
        let cache = CacheProvider::from_config(&config.cache);

        info!(
            driver = %driver_name,
            cache = cache.backend_name(),
            max_connections = config.pool.max_connections,
            "model context ready"
        );

        Ok(Self::builder().pool(pool).cache(cache).build())
    }

    /// The connection pool, or `NotConfigured` if none was supplied.
    pub fn pool(&self) -> Result<&ConnectionPool> {
        self.pool.as_ref().ok_or(ModelError::NotConfigured)
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_some()
    }

    pub fn cache(&self) -> &CacheProvider {
        &self.cache
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn repository(self: &Arc<Self>, schema: Arc<EntitySchema>) -> Repository {
        Repository::new(schema, Arc::clone(self))
    }
}

pub struct ModelContextBuilder {
    pool: Option<ConnectionPool>,
    cache: CacheProvider,
    clock: Arc<dyn Clock>,
}

impl Default for ModelContextBuilder {
    fn default() -> Self {
        Self {
            pool: None,
            cache: CacheProvider::disabled(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl ModelContextBuilder {
    pub fn pool(mut self, pool: ConnectionPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn cache(mut self, cache: CacheProvider) -> Self {
        self.cache = cache;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Arc<ModelContext> {
        Arc::new(ModelContext {
            pool: self.pool,
            cache: self.cache,
            clock: self.clock,
        })
    }
}
