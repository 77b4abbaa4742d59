//! Application-level configuration, loaded from JSON.
//!
//! ```json
//! {
//!   "cache": { "backend": "memory", "ttl_secs": 300, "options": { "capacity": "4096" } },
//!   "pool": { "max_connections": 16 }
//! }
//! ```
//!
//! Every section and field is optional.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::connection::config::ConnectionConfig;
use crate::core::{ModelError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub cache: CacheConfig,
    pub pool: PoolConfig,
}

impl ModelConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ModelError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}

/// Which cache backend to build, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend name: `"null"`, `"memory"` or `"redis"`. Unknown names fall back to `"null"`.
    pub backend: String,
    /// Expiry applied to every entry the mapping layer writes; 0 disables expiry.
    pub ttl_secs: u64,
    /// Backend-specific settings: `capacity` for `"memory"`; `host`, `port` and `db` for `"redis"`.
    pub options: HashMap<String, String>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: "null".to_string(),
            ttl_secs: 300,
            options: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min_connections: usize,
    pub max_connections: usize,
    pub connect_timeout_ms: u64,
    pub idle_timeout_secs: Option<u64>,
    pub max_lifetime_secs: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            connect_timeout_ms: 30_000,
            idle_timeout_secs: Some(600),
            max_lifetime_secs: Some(1800),
        }
    }
}

impl From<&PoolConfig> for ConnectionConfig {
    fn from(pool: &PoolConfig) -> Self {
        ConnectionConfig::new()
            .min_connections(pool.min_connections)
            .max_connections(pool.max_connections)
            .connect_timeout(Duration::from_millis(pool.connect_timeout_ms))
            .idle_timeout(pool.idle_timeout_secs.map(Duration::from_secs))
            .max_lifetime(pool.max_lifetime_secs.map(Duration::from_secs))
    }
}
