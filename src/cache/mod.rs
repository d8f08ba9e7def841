/// Volatile caching layer for the identity core
///
/// Provides cache-aside storage for:
/// - Resolved external identities, keyed by hashed credential
/// - Positive permission grants, keyed by (identity type, identity id)
///
/// Every backend may fail with `CacheError`. Callers treat a failed read as a
/// miss and a failed write as a no-op; nothing here is a correctness dependency.

pub mod memory;
pub mod redis_cache;

pub use self::memory::{MemoryCache, NoopCache};
pub use self::redis_cache::RedisCache;

use crate::error::{AuthError, AuthResult, CacheError};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw string key/value cache backend
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value; `Ok(None)` is a miss
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value, optionally expiring after `ttl`
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Remove a value
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Which backend to build when Redis is not enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCacheMode {
    Memory,
    Disabled,
}

/// Cache layer configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Use Redis (default: false)
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub redis_url: String,

    /// Key prefix for all cache entries (default: "payscope:")
    pub key_prefix: String,

    /// Backend used when Redis is disabled (default: in-process memory)
    pub local_mode: LocalCacheMode,

    /// Identity cache TTL. `None` keeps entries until flushed.
    pub identity_ttl: Option<Duration>,

    /// Permission cache TTL. `None` keeps entries until flushed.
    pub permission_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "payscope:".to_string(),
            local_mode: LocalCacheMode::Memory,
            identity_ttl: None,
            permission_ttl: None,
        }
    }
}

impl CacheConfig {
    /// Load from environment variables
    pub fn from_env() -> AuthResult<Self> {
        let local_mode = match std::env::var("CACHE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => LocalCacheMode::Memory,
            "none" | "disabled" => LocalCacheMode::Disabled,
            other => {
                return Err(AuthError::Validation(format!(
                    "Invalid CACHE_BACKEND: {}",
                    other
                )))
            }
        };

        Ok(Self {
            enabled: std::env::var("CACHE_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("CACHE_KEY_PREFIX")
                .unwrap_or_else(|_| "payscope:".to_string()),
            local_mode,
            identity_ttl: ttl_from_env("CACHE_IDENTITY_TTL")?,
            permission_ttl: ttl_from_env("CACHE_PERMISSION_TTL")?,
        })
    }
}

fn ttl_from_env(var: &str) -> AuthResult<Option<Duration>> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| AuthError::Validation(format!("Invalid {}: {}", var, raw)))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        _ => Ok(None),
    }
}

/// A connected backend, plus the concrete memory cache when one is in use so
/// the purge job can reach it
#[derive(Clone)]
pub struct ConnectedCache {
    pub backend: Arc<dyn CacheBackend>,
    pub memory: Option<Arc<MemoryCache>>,
}

/// Build the configured backend. Redis connection failures are fatal here;
/// outages after startup are absorbed per call.
pub async fn connect(config: &CacheConfig) -> AuthResult<ConnectedCache> {
    if config.enabled {
        let redis = RedisCache::connect(&config.redis_url, &config.key_prefix).await?;
        return Ok(ConnectedCache {
            backend: Arc::new(redis),
            memory: None,
        });
    }

    match config.local_mode {
        LocalCacheMode::Memory => {
            let memory = Arc::new(MemoryCache::new());
            Ok(ConnectedCache {
                backend: memory.clone(),
                memory: Some(memory),
            })
        }
        LocalCacheMode::Disabled => Ok(ConnectedCache {
            backend: Arc::new(NoopCache),
            memory: None,
        }),
    }
}

/// JSON-typed view over one category of a backend
#[derive(Clone)]
pub struct TypedCache {
    backend: Arc<dyn CacheBackend>,
    category: &'static str,
    ttl: Option<Duration>,
}

impl TypedCache {
    pub fn new(backend: Arc<dyn CacheBackend>, category: &'static str, ttl: Option<Duration>) -> Self {
        Self {
            backend,
            category,
            ttl,
        }
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.category, key)
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Get a value. A value that no longer decodes is dropped and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let cache_key = self.build_key(key);

        match self.backend.get(&cache_key).await? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!("Dropping undecodable cache entry {}: {}", cache_key, e);
                    let _ = self.backend.delete(&cache_key).await;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let cache_key = self.build_key(key);
        let json = serde_json::to_string(value)
            .map_err(|e| CacheError::Encoding(format!("{}: {}", cache_key, e)))?;

        debug!("Cache SET via {}: {}", self.backend.name(), cache_key);
        self.backend.set(&cache_key, json, self.ttl).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.backend.delete(&self.build_key(key)).await
    }
}

/// Cache key for a credential. Raw bearer tokens never enter the keyspace.
pub fn credential_key(credential: &str) -> String {
    hex::encode(Sha256::digest(credential.as_bytes()))
}

/// Cache category constants
pub mod categories {
    pub const IDENTITY: &str = "identity:";
    pub const PERMISSION: &str = "permission:";
}
