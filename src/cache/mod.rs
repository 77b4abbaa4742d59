//! Cache facade in front of primary-key lookups.
//!
//! A [`CacheBackend`] stores opaque byte payloads under string keys. The mapping
//! layer talks to it only through [`CacheProvider`], which applies one TTL to
//! every write and turns backend failures into misses.

mod key;
mod memory;
mod null;
mod provider;
#[cfg(feature = "redis")]
mod redis_backend;

pub use key::CacheKey;
pub use memory::{CacheStats, MemoryCache};
pub use null::NullCache;
pub use provider::{CacheProvider, DEFAULT_TTL};
#[cfg(feature = "redis")]
pub use redis_backend::{RedisCache, RedisOptions};

use async_trait::async_trait;
use std::time::Duration;
use crate::core::Result;

/// Pluggable key/value store.
///
/// Every operation is idempotent from the caller's perspective. `ttl` of `None`
/// keeps the entry until it is evicted or deleted.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value`, overwriting any current entry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool>;

    /// Stores `value` only if `key` is absent. Returns `false` when it was present.
    async fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool>;

    /// Removes `key`. Succeeds whether or not it was present.
    async fn delete(&self, key: &str) -> Result<bool>;
}
