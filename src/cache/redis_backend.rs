use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;
use super::CacheBackend;
use crate::core::{ModelError, Result};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6379;

/// Where the Redis server lives.
///
/// Read from the cache `options` map: `host` (or `server`), `port` and `db`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisOptions {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db: 0,
        }
    }
}

impl RedisOptions {
    pub fn from_map(options: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();

        let host = match options.get("host").or_else(|| options.get("server")) {
            Some(host) => host.trim().to_string(),
            None => defaults.host,
        };
        if host.is_empty() || host.contains(['/', '@', ' ']) {
            return Err(ModelError::Config(format!("Invalid redis host '{}'", host)));
        }

        let port = match options.get("port") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| ModelError::Config(format!("Invalid redis port '{}'", raw)))?,
            None => defaults.port,
        };

        let db = match options.get("db") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|db| *db >= 0)
                .ok_or_else(|| ModelError::Config(format!("Invalid redis db '{}'", raw)))?,
            None => defaults.db,
        };

        Ok(Self { host, port, db })
    }

    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Backend on a Redis server.
///
/// The connection is opened on first use and shared by every caller afterwards.
/// Entries with a TTL are written with `SET .. EX`; `add` uses `SET .. NX`.
pub struct RedisCache {
    client: redis::Client,
    options: RedisOptions,
    connection: OnceCell<MultiplexedConnection>,
}

impl RedisCache {
    pub fn new(options: RedisOptions) -> Result<Self> {
        let client = redis::Client::open(options.url()).map_err(cache_error)?;
        Ok(Self {
            client,
            options,
            connection: OnceCell::new(),
        })
    }

    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        Self::new(RedisOptions::from_map(options)?)
    }

    pub fn options(&self) -> &RedisOptions {
        &self.options
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                debug!(host = %self.options.host, port = self.options.port, "connecting to redis");
                self.client.get_multiplexed_async_connection().await
            })
            .await
            .map_err(cache_error)?;
        Ok(connection.clone())
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        conn.get(key).await.map_err(cache_error)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let mut conn = self.connection().await?;
        let written = match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, expiry_secs(ttl)).await,
            None => conn.set::<_, _, ()>(key, value).await,
        };
        written.map_err(cache_error)?;
        Ok(true)
    }

    async fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(expiry_secs(ttl));
        }
        // Nil reply means the key was already present
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(cache_error)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let _removed: i64 = conn.del(key).await.map_err(cache_error)?;
        Ok(true)
    }
}

/// Redis expiry has whole-second resolution and rejects 0.
fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn cache_error(err: redis::RedisError) -> ModelError {
    ModelError::Cache(format!("redis: {}", err))
}
