use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use super::{CacheBackend, MemoryCache, NullCache, memory::DEFAULT_CAPACITY};
use crate::config::CacheConfig;

/// TTL used when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Best-effort facade over the configured backend.
///
/// The backend is chosen once, when the provider is built. Backend errors are
/// logged and reported as a miss or `false`; they never reach the caller as errors.
#[derive(Clone)]
pub struct CacheProvider {
    backend: Arc<dyn CacheBackend>,
    ttl: Option<Duration>,
}

impl CacheProvider {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Option<Duration>) -> Self {
        Self { backend, ttl }
    }

    /// Provider over [`NullCache`]: every lookup misses.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullCache), Some(DEFAULT_TTL))
    }

    /// Builds the backend named in `config`.
    pub fn from_config(config: &CacheConfig) -> Self {
        let backend: Arc<dyn CacheBackend> = match config.backend.as_str() {
            "null" | "none" | "" => Arc::new(NullCache),
            "memory" => Arc::new(MemoryCache::with_capacity(capacity(config))),
            #[cfg(feature = "redis")]
            "redis" => match super::RedisCache::from_options(&config.options) {
                Ok(cache) => Arc::new(cache),
                Err(err) => {
                    warn!(error = %err, "redis cache misconfigured, caching disabled");
                    Arc::new(NullCache)
                }
            },
            other => {
                warn!(backend = other, "unknown cache backend, caching disabled");
                Arc::new(NullCache)
            }
        };
        debug!(backend = backend.name(), ttl_secs = config.ttl_secs, "cache initialized");
        Self::new(backend, config.ttl())
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "cache get failed");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: Vec<u8>) -> bool {
        self.backend
            .set(key, value, self.ttl)
            .await
            .unwrap_or_else(|err| {
                warn!(key, error = %err, "cache set failed");
                false
            })
    }

    pub async fn add(&self, key: &str, value: Vec<u8>) -> bool {
        self.backend
            .add(key, value, self.ttl)
            .await
            .unwrap_or_else(|err| {
                warn!(key, error = %err, "cache add failed");
                false
            })
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.backend.delete(key).await.unwrap_or_else(|err| {
            warn!(key, error = %err, "cache delete failed");
            false
        })
    }
}

impl Default for CacheProvider {
    fn default() -> Self {
        Self::disabled()
    }
}

fn capacity(config: &CacheConfig) -> usize {
    match config.options.get("capacity") {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(capacity = %raw, "invalid cache capacity, using default");
            DEFAULT_CAPACITY
        }),
        None => DEFAULT_CAPACITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ModelError, Result};
    use async_trait::async_trait;

    struct BrokenCache;

    #[async_trait]
    impl CacheBackend for BrokenCache {
        fn name(&self) -> &str {
            "broken"
        }

        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(ModelError::Cache("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<bool> {
            Err(ModelError::Cache("connection refused".into()))
        }

        async fn add(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<bool> {
            Err(ModelError::Cache("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> Result<bool> {
            Err(ModelError::Cache("connection refused".into()))
        }
    }

    fn config(backend: &str) -> CacheConfig {
        CacheConfig {
            backend: backend.to_string(),
            ..CacheConfig::default()
        }
    }

    #[test]
    fn test_backend_selected_by_name() {
        assert_eq!(CacheProvider::from_config(&config("memory")).backend_name(), "memory");
        assert_eq!(CacheProvider::from_config(&config("null")).backend_name(), "null");
        assert_eq!(CacheProvider::from_config(&config("memcached")).backend_name(), "null");
        assert_eq!(CacheProvider::default().backend_name(), "null");
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_redis_selected_by_name() {
        let mut redis = config("redis");
        redis.options.insert("server".into(), "127.0.0.1".into());
        redis.options.insert("port".into(), "6380".into());
        assert_eq!(CacheProvider::from_config(&redis).backend_name(), "redis");

        redis.options.insert("port".into(), "not a port".into());
        assert_eq!(CacheProvider::from_config(&redis).backend_name(), "null");
    }

    #[test]
    fn test_ttl_comes_from_config() {
        let provider = CacheProvider::from_config(&CacheConfig {
            ttl_secs: 60,
            ..config("memory")
        });
        assert_eq!(provider.ttl(), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_memory_provider_round_trip() {
        let provider = CacheProvider::from_config(&config("memory"));
        assert!(provider.add("k", vec![1]).await);
        assert!(!provider.add("k", vec![2]).await);
        assert_eq!(provider.get("k").await, Some(vec![1]));
        assert!(provider.delete("k").await);
        assert_eq!(provider.get("k").await, None);
    }

    #[tokio::test]
    async fn test_backend_errors_degrade_to_misses() {
        let provider = CacheProvider::new(Arc::new(BrokenCache), None);
        assert_eq!(provider.get("k").await, None);
        assert!(!provider.set("k", vec![1]).await);
        assert!(!provider.add("k", vec![1]).await);
        assert!(!provider.delete("k").await);
    }
}
