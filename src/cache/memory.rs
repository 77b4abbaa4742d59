use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use super::CacheBackend;
use crate::core::Result;

pub const DEFAULT_CAPACITY: usize = 1024;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Process-local LRU backend with per-entry expiry.
///
/// Least recently used entries are evicted once `capacity` is reached.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().await.len(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().await;

        if entries.peek(key).is_some_and(Entry::is_expired) {
            entries.pop(key);
        }
        let value = entries.get(key).map(|entry| entry.value.clone());

        let counter = if value.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        self.entries
            .lock()
            .await
            .put(key.to_string(), Entry::new(value, ttl));
        Ok(true)
    }

    async fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if entries.peek(key).is_some_and(|entry| !entry.is_expired()) {
            return Ok(false);
        }
        entries.put(key.to_string(), Entry::new(value, ttl));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.entries.lock().await.pop(key);
        Ok(true)
    }
}
