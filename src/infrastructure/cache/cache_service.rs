//! Cache Service
//!
//! Cache trait and Redis implementation for catalog caching.
//!
//! The trait works on raw strings so it can be held as `Arc<dyn Cache>`;
//! the typed `get_json` / `set_json` helpers sit on `dyn Cache`. Cache
//! failures never fail a request: reads degrade to a miss and writes are
//! dropped with a warning.
//!
//! # Example
//!
//! ```rust,ignore
//! let cache: Arc<dyn Cache> = Arc::new(RedisCache::new(redis_handle));
//! cache.set_json(keys::MOVIES_NOW_SHOWING, &movies, 60).await;
//! let movies: Option<Vec<MovieResponse>> = cache.get_json(keys::MOVIES_NOW_SHOWING).await;
//! ```

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument, warn};

use super::RedisHandle;
use crate::shared::error::AppError;

/// Cache operations used by the application.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Retrieves a raw value from the cache by key.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Stores a raw value with an expiration time in seconds.
    async fn set_raw(&self, key: &str, value: String, seconds: u64) -> Result<(), AppError>;

    /// Deletes keys, returning how many existed.
    async fn delete(&self, keys: &[&str]) -> Result<u64, AppError>;
}

impl dyn Cache {
    /// Typed read. Errors and undecodable entries count as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get_raw(key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache deserialization error");
                    None
                }
            },
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Typed write; failures are logged and swallowed.
    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T, seconds: u64) {
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache serialization error");
                return;
            }
        };
        if let Err(e) = self.set_raw(key, data, seconds).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// Drop keys; failures are logged and swallowed.
    pub async fn invalidate(&self, keys: &[&str]) {
        if let Err(e) = self.delete(keys).await {
            warn!(keys = ?keys, error = %e, "Cache invalidation failed");
        }
    }
}

/// Redis-backed cache implementation.
#[derive(Clone)]
pub struct RedisCache {
    redis: RedisHandle,
}

impl RedisCache {
    pub fn new(redis: RedisHandle) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl Cache for RedisCache {
    #[instrument(skip(self), level = "debug")]
    async fn get_raw(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.redis.connection().await?;
        let result: Option<String> = conn.get(key).await?;
        Ok(result)
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set_raw(&self, key: &str, value: String, seconds: u64) -> Result<(), AppError> {
        let mut conn = self.redis.connection().await?;
        let _: () = conn.set_ex(key, value, seconds).await?;
        debug!(key = %key, ttl = seconds, "Cache set with expiry");
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, keys: &[&str]) -> Result<u64, AppError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.redis.connection().await?;
        let deleted: u64 = conn.del(keys).await?;
        Ok(deleted)
    }
}

/// Cache that stores nothing, used when catalog caching is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get_raw(&self, _key: &str) -> Result<Option<String>, AppError> {
        Ok(None)
    }

    async fn set_raw(&self, _key: &str, _value: String, _seconds: u64) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete(&self, _keys: &[&str]) -> Result<u64, AppError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_noop_cache_always_misses() {
        let cache: Arc<dyn Cache> = Arc::new(NoopCache);
        cache.set_json("k", &vec![1, 2, 3], 60).await;
        let value: Option<Vec<i32>> = cache.get_json("k").await;
        assert!(value.is_none());
    }
}
