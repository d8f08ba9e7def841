/// Application context and dependency injection
use crate::{
    cache::{self, CacheBackend, MemoryCache},
    config::ServiceConfig,
    db,
    error::AuthResult,
    guard::AccessGuard,
    identity::{FacebookProvider, FacebookProviderConfig, IdentityService, IdentityServiceConfig},
    permission::{
        AllowListResolver, ContributionResolver, PermissionResolver, PermissionService,
        PermissionServiceConfig,
    },
    store::SqliteUserStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServiceConfig>,
    pub db: SqlitePool,
    pub cache: Arc<dyn CacheBackend>,
    /// Set when the in-process cache is in use, for the purge job
    pub memory_cache: Option<Arc<MemoryCache>>,
    pub contributions: Arc<ContributionResolver>,
    pub identity: IdentityService,
    pub permission: PermissionService,
    pub guard: AccessGuard,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServiceConfig) -> AuthResult<Self> {
        // Validate configuration
        config.validate()?;

        // Initialize database
        let db = db::create_pool(&config.storage.database_path, db::DatabaseOptions::default())
            .await?;

        // Run migrations
        db::run_migrations(&db).await?;

        // Test connection
        db::test_connection(&db).await?;

        Self::with_pool(config, db).await
    }

    /// Build the context over an existing, migrated pool
    pub async fn with_pool(config: ServiceConfig, db: SqlitePool) -> AuthResult<Self> {
        // Initialize cache
        let connected = cache::connect(&config.cache).await?;
        tracing::info!("Cache backend: {}", connected.backend.name());

        // Initialize identity provider
        let provider = Arc::new(FacebookProvider::new(FacebookProviderConfig {
            base_url: config.identity.provider_url.clone(),
            timeout: config.identity.provider_timeout,
            ..FacebookProviderConfig::default()
        })?);

        let identity = IdentityService::new(
            provider,
            connected.backend.clone(),
            Arc::new(SqliteUserStore::new(db.clone())),
            IdentityServiceConfig {
                provider_timeout: config.identity.provider_timeout,
                cache_ttl: config.cache.identity_ttl,
            },
        );

        // Initialize permission resolver; the allow list only wraps when configured
        let contributions = Arc::new(
            ContributionResolver::new(db.clone())
                .with_min_contributions(config.permission.min_contributions),
        );
        let resolver: Arc<dyn PermissionResolver> = if config.permission.allow_list.is_empty() {
            contributions.clone()
        } else {
            tracing::info!(
                "Permission allow list has {} principal(s)",
                config.permission.allow_list.len()
            );
            Arc::new(
                AllowListResolver::new(config.permission.allow_list.iter().cloned())
                    .or_else(contributions.clone()),
            )
        };

        let permission = PermissionService::new(
            resolver,
            connected.backend.clone(),
            PermissionServiceConfig {
                resolver_timeout: config.permission.resolver_timeout,
                cache_ttl: config.cache.permission_ttl,
            },
        );

        let guard = AccessGuard::new(identity.clone(), permission.clone());

        Ok(Self {
            config: Arc::new(config),
            db,
            cache: connected.backend,
            memory_cache: connected.memory,
            contributions,
            identity,
            permission,
            guard,
        })
    }
}
