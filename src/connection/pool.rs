use super::{Connection, Driver, config::ConnectionConfig};
use crate::core::{ModelError, Result};
use crate::result::{ExecOutcome, QueryResult};
use crate::statement::Statement;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Connection pool
///
/// Hands out one connection per operation. The [`PoolGuard`] returned by
/// [`ConnectionPool::get_connection`] puts the connection back when dropped,
/// on every exit path.
pub struct ConnectionPool {
    /// Pool configuration
    config: ConnectionConfig,
    /// Opens new connections
    driver: Arc<dyn Driver>,
    /// Available connections
    available: Arc<Mutex<VecDeque<PooledConnection>>>,
    /// Total number of connections created and not yet discarded
    total_connections: Arc<AtomicUsize>,
    /// Next connection ID
    next_id: AtomicU64,
}

/// A connection from the pool
struct PooledConnection {
    id: u64,
    connection: Box<dyn Connection>,
    created_at: Instant,
    last_used: Instant,
}

impl PooledConnection {
    fn new(id: u64, connection: Box<dyn Connection>) -> Self {
        let now = Instant::now();
        Self {
            id,
            connection,
            created_at: now,
            last_used: now,
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        if let Some(lifetime) = max_lifetime {
            self.created_at.elapsed() > lifetime
        } else {
            false
        }
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        if let Some(timeout) = idle_timeout {
            self.last_used.elapsed() > timeout
        } else {
            false
        }
    }

    fn refresh_last_used(&mut self) {
        self.last_used = Instant::now();
    }
}

impl ConnectionPool {
    /// Create a new connection pool over `driver`
    pub async fn new(config: ConnectionConfig, driver: Arc<dyn Driver>) -> Result<Self> {
        config.validate().map_err(ModelError::Config)?;

        let pool = Self {
            config,
            driver,
            available: Arc::new(Mutex::new(VecDeque::new())),
            total_connections: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
        };

        // Pre-create minimum connections
        pool.ensure_min_connections().await?;

        Ok(pool)
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Get a connection from the pool
    pub async fn get_connection(&self) -> Result<PoolGuard> {
        let start = Instant::now();

        loop {
            // Try to get an available connection
            if let Some(mut pooled) = self.try_get_available().await {
                pooled.refresh_last_used();
                return Ok(self.guard(pooled));
            }

            // Try to create a new connection if under limit
            if let Some(pooled) = self.try_create_connection().await? {
                return Ok(self.guard(pooled));
            }

            // Check timeout
            if start.elapsed() > self.config.connect_timeout {
                return Err(ModelError::ExecutionFailed(
                    "Connection pool timeout: no connections available".into(),
                ));
            }

            // Wait a bit before retrying
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn guard(&self, pooled: PooledConnection) -> PoolGuard {
        PoolGuard {
            connection: Some(pooled),
            pool: self.available.clone(),
            total_connections: self.total_connections.clone(),
        }
    }

    /// Try to get an available connection from the pool
    async fn try_get_available(&self) -> Option<PooledConnection> {
        let mut available = self.available.lock().await;

        let mut kept = VecDeque::with_capacity(available.len());
        let mut removed = 0usize;
        while let Some(pooled) = available.pop_front() {
            if pooled.is_expired(self.config.max_lifetime)
                || pooled.is_idle_too_long(self.config.idle_timeout)
                || !pooled.connection.is_valid()
            {
                debug!(connection = pooled.id, "discarding stale pooled connection");
                removed += 1;
            } else {
                kept.push_back(pooled);
            }
        }
        *available = kept;

        if removed > 0 {
            self.total_connections.fetch_sub(removed, Ordering::SeqCst);
        }

        available.pop_front()
    }

    /// Try to create a new connection if under limit
    async fn try_create_connection(&self) -> Result<Option<PooledConnection>> {
        // Reserve the slot first so concurrent callers cannot overshoot the limit
        let reserved = self.total_connections.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |total| {
            (total < self.config.max_connections).then_some(total + 1)
        });
        if reserved.is_err() {
            return Ok(None);
        }

        match self.driver.connect().await {
            Ok(connection) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                debug!(connection = id, driver = self.driver.name(), "opened connection");
                Ok(Some(PooledConnection::new(id, connection)))
            }
            Err(err) => {
                self.total_connections.fetch_sub(1, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Ensure minimum number of connections
    async fn ensure_min_connections(&self) -> Result<()> {
        while self.total_connections.load(Ordering::SeqCst) < self.config.min_connections {
            if let Some(pooled) = self.try_create_connection().await? {
                self.available.lock().await.push_back(pooled);
            }
        }

        Ok(())
    }

    /// Get pool statistics
    pub async fn stats(&self) -> PoolStats {
        let available = self.available.lock().await;
        let total = self.total_connections.load(Ordering::SeqCst);

        PoolStats {
            total_connections: total,
            available_connections: available.len(),
            active_connections: total.saturating_sub(available.len()),
            max_connections: self.config.max_connections,
        }
    }
}

/// Connection pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} available, max {}",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections
        )
    }
}

/// RAII guard for pooled connections
///
/// Returns the connection to the pool when dropped
pub struct PoolGuard {
    connection: Option<PooledConnection>,
    pool: Arc<Mutex<VecDeque<PooledConnection>>>,
    total_connections: Arc<AtomicUsize>,
}

impl PoolGuard {
    /// Get a reference to the connection
    pub fn connection(&mut self) -> &mut dyn Connection {
        // Only `Drop` takes the connection out, so it is always present here.
        match self.connection.as_mut() {
            Some(pooled) => pooled.connection.as_mut(),
            None => unreachable!("connection already returned to pool"),
        }
    }

    /// Execute an INSERT/UPDATE/DELETE (convenience method)
    pub async fn execute(&mut self, statement: &Statement) -> Result<ExecOutcome> {
        self.connection().execute(statement).await
    }

    /// Run a SELECT (convenience method)
    pub async fn query(&mut self, statement: &Statement) -> Result<QueryResult> {
        self.connection().query(statement).await
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(pooled) = self.connection.take() {
            if !pooled.connection.is_valid() {
                debug!(connection = pooled.id, "dropping invalid connection");
                self.total_connections.fetch_sub(1, Ordering::SeqCst);
                return;
            }

            // Try to return to pool if we can acquire the lock immediately
            if let Ok(mut pool) = self.pool.try_lock() {
                pool.push_back(pooled);
            } else {
                warn!(
                    connection = pooled.id,
                    "pool lock busy while returning connection, discarding it"
                );
                self.total_connections.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDatabase;

    fn driver() -> Arc<dyn Driver> {
        Arc::new(MemoryDatabase::new())
    }

    #[tokio::test]
    async fn test_pool_creation() {
        let config = ConnectionConfig::new().min_connections(2).max_connections(5);

        let pool = ConnectionPool::new(config, driver()).await.unwrap();
        let stats = pool.stats().await;

        assert_eq!(stats.total_connections, 2); // min_connections
        assert_eq!(stats.available_connections, 2);
        assert_eq!(pool.driver_name(), "memory");
    }

    #[tokio::test]
    async fn test_connection_return_to_pool() {
        let config = ConnectionConfig::new().min_connections(1).max_connections(5);

        let pool = ConnectionPool::new(config, driver()).await.unwrap();

        {
            let _conn = pool.get_connection().await.unwrap();
            let stats = pool.stats().await;
            assert_eq!(stats.active_connections, 1);
            assert_eq!(stats.available_connections, 0);
        } // Connection returned here

        let stats = pool.stats().await;
        assert_eq!(stats.available_connections, 1);
        assert_eq!(stats.total_connections, 1);
    }

    #[tokio::test]
    async fn test_max_connections_limit() {
        let config = ConnectionConfig::new()
            .max_connections(2)
            .connect_timeout(Duration::from_millis(100));

        let pool = ConnectionPool::new(config, driver()).await.unwrap();

        let _conn1 = pool.get_connection().await.unwrap();
        let _conn2 = pool.get_connection().await.unwrap();

        // Third connection should timeout
        let result = pool.get_connection().await;
        assert!(matches!(result, Err(ModelError::ExecutionFailed(_))));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = ConnectionConfig::new().max_connections(0);
        let result = ConnectionPool::new(config, driver()).await;
        assert!(matches!(result, Err(ModelError::Config(_))));
    }

    #[tokio::test]
    async fn test_expired_connections_are_replaced() {
        let config = ConnectionConfig::new()
            .min_connections(1)
            .max_connections(1)
            .max_lifetime(Some(Duration::from_millis(1)));

        let pool = ConnectionPool::new(config, driver()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let _conn = pool.get_connection().await.unwrap();
        let stats = pool.stats().await;
        assert_eq!(stats.total_connections, 1);
        assert_eq!(stats.active_connections, 1);
    }
}
