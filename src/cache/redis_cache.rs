/// Redis cache backend shared across service instances
use super::CacheBackend;
use crate::error::{AuthError, AuthResult, CacheError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Redis cache client
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisCache {
    /// Connect to Redis
    pub async fn connect(redis_url: &str, key_prefix: &str) -> AuthResult<Self> {
        info!("Connecting to Redis at {}", redis_url);

        let client = Client::open(redis_url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            AuthError::Internal(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            AuthError::Internal(format!("Redis connection failed: {}", e))
        })?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
        })
    }

    /// Build a cache key with prefix
    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let cache_key = self.build_key(key);

        debug!("Cache GET: {}", cache_key);

        let mut conn = self.connection.clone();
        let result: Option<String> = conn.get(&cache_key).await.map_err(|e| {
            warn!("Redis GET failed for {}: {}", cache_key, e);
            CacheError::Unavailable(format!("GET {}: {}", cache_key, e))
        })?;

        Ok(result)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        let cache_key = self.build_key(key);
        let mut conn = self.connection.clone();

        let outcome: redis::RedisResult<()> = match ttl {
            Some(ttl) => {
                debug!("Cache SET: {} (TTL: {}s)", cache_key, ttl.as_secs());
                conn.set_ex(&cache_key, value, ttl.as_secs().max(1)).await
            }
            None => {
                debug!("Cache SET: {} (no TTL)", cache_key);
                conn.set(&cache_key, value).await
            }
        };

        outcome.map_err(|e| {
            warn!("Redis SET failed for {}: {}", cache_key, e);
            CacheError::Unavailable(format!("SET {}: {}", cache_key, e))
        })
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let cache_key = self.build_key(key);

        debug!("Cache DELETE: {}", cache_key);

        let mut conn = self.connection.clone();
        let _: i64 = conn.del(&cache_key).await.map_err(|e| {
            warn!("Redis DELETE failed for {}: {}", cache_key, e);
            CacheError::Unavailable(format!("DEL {}: {}", cache_key, e))
        })?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await.map_err(|e| {
            error!("Redis PING failed: {}", e);
            CacheError::Unavailable(format!("PING: {}", e))
        })?;

        if pong != "PONG" {
            return Err(CacheError::Unavailable(format!(
                "Unexpected Redis PING response: {}",
                pong
            )));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
