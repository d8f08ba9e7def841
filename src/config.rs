/// Configuration management for Payscope
use crate::cache::CacheConfig;
use crate::error::{AuthError, AuthResult};
use crate::permission::PermissionKey;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub identity: IdentityConfig,
    pub permission: PermissionConfig,
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

/// Identity provider configuration
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub provider_url: String,
    pub provider_timeout: Duration,
}

/// Permission resolution configuration
#[derive(Debug, Clone)]
pub struct PermissionConfig {
    pub resolver_timeout: Duration,
    /// Principals granted regardless of contributions
    pub allow_list: Vec<PermissionKey>,
    /// Contributions required to browse records
    pub min_contributions: i64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `info` or `payscope=debug,sqlx=warn`
    pub level: String,
}

impl LoggingConfig {
    /// Filter for the tracing subscriber, falling back to `info` on bad directives
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        tracing_subscriber::EnvFilter::try_new(&self.level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AuthResult<Self> {
        dotenv::dotenv().ok();

        let database_path = env::var("PAYSCOPE_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/payscope.sqlite"));

        let cache = CacheConfig::from_env()?;

        let provider_url = env::var("IDENTITY_PROVIDER_URL")
            .unwrap_or_else(|_| "https://graph.facebook.com/v19.0".to_string());
        let provider_timeout = millis_from_env("IDENTITY_PROVIDER_TIMEOUT_MS", 5000)?;

        let resolver_timeout = millis_from_env("PERMISSION_RESOLVER_TIMEOUT_MS", 5000)?;

        // Parse allow list from comma-separated type:id pairs
        let allow_list = env::var("PERMISSION_ALLOW_LIST")
            .unwrap_or_else(|_| String::new())
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(PermissionKey::parse)
            .collect::<AuthResult<Vec<_>>>()?;

        let min_contributions = env::var("PERMISSION_MIN_CONTRIBUTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .map_err(|_| {
                AuthError::Validation("Invalid PERMISSION_MIN_CONTRIBUTIONS".to_string())
            })?;

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServiceConfig {
            storage: StorageConfig { database_path },
            cache,
            identity: IdentityConfig {
                provider_url,
                provider_timeout,
            },
            permission: PermissionConfig {
                resolver_timeout,
                allow_list,
                min_contributions,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AuthResult<()> {
        if self.storage.database_path.as_os_str().is_empty() {
            return Err(AuthError::Validation(
                "Database path cannot be empty".to_string(),
            ));
        }

        if self.identity.provider_url.is_empty() {
            return Err(AuthError::Validation(
                "Identity provider URL cannot be empty".to_string(),
            ));
        }

        if self.identity.provider_timeout.is_zero() {
            return Err(AuthError::Validation(
                "Identity provider timeout must be positive".to_string(),
            ));
        }

        if self.permission.resolver_timeout.is_zero() {
            return Err(AuthError::Validation(
                "Permission resolver timeout must be positive".to_string(),
            ));
        }

        if self.permission.min_contributions < 1 {
            return Err(AuthError::Validation(
                "PERMISSION_MIN_CONTRIBUTIONS must be at least 1".to_string(),
            ));
        }

        for (name, ttl) in [
            ("CACHE_IDENTITY_TTL", self.cache.identity_ttl),
            ("CACHE_PERMISSION_TTL", self.cache.permission_ttl),
        ] {
            if ttl.is_some_and(|ttl| ttl.is_zero()) {
                return Err(AuthError::Validation(format!(
                    "{} must be positive when set",
                    name
                )));
            }
        }

        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                database_path: PathBuf::from("./data/payscope.sqlite"),
            },
            cache: CacheConfig::default(),
            identity: IdentityConfig {
                provider_url: "https://graph.facebook.com/v19.0".to_string(),
                provider_timeout: Duration::from_millis(5000),
            },
            permission: PermissionConfig {
                resolver_timeout: Duration::from_millis(5000),
                allow_list: Vec::new(),
                min_contributions: 1,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

fn millis_from_env(var: &str, default: u64) -> AuthResult<Duration> {
    let millis: u64 = env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| AuthError::Validation(format!("Invalid {}", var)))?;
    Ok(Duration::from_millis(millis))
}
