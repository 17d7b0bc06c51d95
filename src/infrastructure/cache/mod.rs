//! Cache Module
//!
//! Redis connection management and caching utilities.
//!
//! This module provides:
//! - A lazily connected Redis handle with automatic reconnection
//! - A `Cache` trait for abstracting cache operations
//! - `RedisCache` and `NoopCache` implementations
//! - Predefined key names for consistent cache key naming
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! |   Application     |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! |   Cache Trait     |  <-- Abstract interface
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! |   RedisCache      |  <-- Concrete implementation
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! |   RedisHandle     |  <-- ConnectionManager, opened on first use
//! +-------------------+
//! ```

mod cache_service;

pub use cache_service::{Cache, NoopCache, RedisCache};

use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::Client;
use tokio::sync::OnceCell;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Shared Redis connection that is established on first use.
///
/// The server starts even when Redis is down; callers see the connection
/// error on each use until Redis becomes reachable.
#[derive(Clone)]
pub struct RedisHandle {
    client: Client,
    manager: Arc<OnceCell<ConnectionManager>>,
}

impl RedisHandle {
    /// Validate the URL without connecting.
    pub fn new(settings: &RedisSettings) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: Client::open(settings.url.as_str())?,
            manager: Arc::new(OnceCell::new()),
        })
    }

    /// Connection manager with automatic reconnection.
    #[instrument(skip(self), level = "debug")]
    pub async fn connection(&self) -> Result<ConnectionManager, redis::RedisError> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                let manager = ConnectionManager::new(self.client.clone()).await?;
                info!("Redis connection established");
                Ok::<_, redis::RedisError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }

    /// Round-trip a PING, used by the readiness probe.
    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Cache key names.
///
/// # Example
/// ```rust,ignore
/// use cinema_server::infrastructure::cache::keys;
///
/// let key = keys::rate_limit("rl:auth", "ip:10.0.0.1");
/// ```
pub mod keys {
    /// Now-showing movie list
    pub const MOVIES_NOW_SHOWING: &str = "catalog:movies:now_showing";

    /// Coming-soon movie list
    pub const MOVIES_COMING_SOON: &str = "catalog:movies:coming_soon";

    /// Every catalog key invalidated by a movie write
    pub const MOVIE_LISTS: [&str; 2] = [MOVIES_NOW_SHOWING, MOVIES_COMING_SOON];

    /// Generates a rate limit key
    #[inline]
    pub fn rate_limit(prefix: &str, identifier: &str) -> String {
        format!("{}:{}", prefix, identifier)
    }
}
