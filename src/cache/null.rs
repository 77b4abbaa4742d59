use async_trait::async_trait;
use std::time::Duration;
use super::CacheBackend;
use crate::core::Result;

/// Backend that stores nothing. Lookups always miss and writes report success.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

#[async_trait]
impl CacheBackend for NullCache {
    fn name(&self) -> &str {
        "null"
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<bool> {
        Ok(true)
    }

    async fn add(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<bool> {
        Ok(true)
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Ok(true)
    }
}
