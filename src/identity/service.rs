/// Identity Service - resolves credentials to durable users with caching
use crate::{
    cache::{categories, credential_key, CacheBackend, TypedCache},
    error::{AuthError, AuthResult, CacheError, ProviderError, StoreError},
    identity::{ExternalIdentity, IdentityProvider},
    metrics::{self, CacheOutcome},
    store::{NewUser, User, UserStore},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Identity service configuration
#[derive(Debug, Clone)]
pub struct IdentityServiceConfig {
    /// Upper bound on a provider call; expiry means unauthenticated
    pub provider_timeout: Duration,
    /// Identity cache TTL; `None` keeps entries until flushed
    pub cache_ttl: Option<Duration>,
}

impl Default for IdentityServiceConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(5),
            cache_ttl: None,
        }
    }
}

/// Turns bearer credentials into `User` records
#[derive(Clone)]
pub struct IdentityService {
    provider: Arc<dyn IdentityProvider>,
    cache: TypedCache,
    users: Arc<dyn UserStore>,
    config: IdentityServiceConfig,
}

impl IdentityService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        cache: Arc<dyn CacheBackend>,
        users: Arc<dyn UserStore>,
        config: IdentityServiceConfig,
    ) -> Self {
        Self {
            provider,
            cache: TypedCache::new(cache, categories::IDENTITY, config.cache_ttl),
            users,
            config,
        }
    }

    /// Identity type of the underlying provider
    pub fn identity_type(&self) -> &str {
        self.provider.identity_type()
    }

    /// Resolve a credential to its durable user, creating the user on first sight
    ///
    /// Resolution order:
    /// 1. Identity cache (a read failure counts as a miss)
    /// 2. Identity provider (any failure is `Unauthenticated`)
    /// 3. Best-effort identity cache write
    /// 4. Find-or-create in the user store, re-reading once on a duplicate key
    pub async fn resolve(&self, credential: &str) -> AuthResult<User> {
        let identity = self.external_identity(credential).await?;
        self.find_or_create(identity).await
    }

    /// Steps 1-3: the external identity behind a credential
    pub async fn external_identity(&self, credential: &str) -> AuthResult<ExternalIdentity> {
        if credential.trim().is_empty() {
            return Err(ProviderError::MissingCredential.into());
        }

        let key = credential_key(credential);

        match self.cache.get::<ExternalIdentity>(&key).await {
            Ok(Some(identity)) => {
                metrics::record_cache_lookup("identity", CacheOutcome::Hit);
                debug!("Identity cache hit for external id {}", identity.external_id);
                return Ok(identity);
            }
            Ok(None) => {
                metrics::record_cache_lookup("identity", CacheOutcome::Miss);
            }
            Err(e) => {
                metrics::record_cache_lookup("identity", CacheOutcome::Error);
                warn!("Identity cache read failed, treating as miss: {}", e);
            }
        }

        let identity = self.verify_with_provider(credential).await?;

        if let Err(e) = self.cache.set(&key, &identity).await {
            metrics::record_cache_write_failure("identity");
            warn!("Identity cache write failed, continuing: {}", e);
        }

        Ok(identity)
    }

    async fn verify_with_provider(&self, credential: &str) -> AuthResult<ExternalIdentity> {
        let provider = self.provider.identity_type().to_string();
        let started = Instant::now();

        let result = match tokio::time::timeout(
            self.config.provider_timeout,
            self.provider.verify(credential),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.config.provider_timeout)),
        };

        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(identity) => {
                metrics::record_provider_call(&provider, "success", elapsed);
                Ok(identity)
            }
            Err(e) => {
                metrics::record_provider_call(&provider, provider_outcome(&e), elapsed);
                warn!("Identity provider {} refused credential: {}", provider, e);
                Err(e.into())
            }
        }
    }

    /// Step 4: durable user for an external identity
    pub async fn find_or_create(&self, identity: ExternalIdentity) -> AuthResult<User> {
        if let Some(user) = self.users.find_by_external_id(&identity.external_id).await? {
            return Ok(user);
        }

        let external_id = identity.external_id.clone();

        match self.users.insert(NewUser::from(identity)).await {
            Ok(user) => {
                metrics::record_user_created();
                info!(
                    "Created user {} for external id {}",
                    user.internal_id, user.external_id
                );
                Ok(user)
            }
            Err(StoreError::DuplicateKey(_)) => {
                // A concurrent resolution committed first; its record wins
                metrics::record_user_create_race();
                debug!("Duplicate key for external id {}, re-reading", external_id);

                match self.users.find_by_external_id(&external_id).await {
                    Ok(Some(user)) => Ok(user),
                    Ok(None) => {
                        error!("User {} missing after duplicate key", external_id);
                        Err(AuthError::Internal(format!(
                            "user for external id {} vanished after duplicate key",
                            external_id
                        )))
                    }
                    Err(e) => {
                        error!("Re-read after duplicate key failed for {}: {}", external_id, e);
                        Err(AuthError::Internal(format!(
                            "re-read after duplicate key failed: {}",
                            e
                        )))
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop the cached identity for a credential
    pub async fn invalidate(&self, credential: &str) -> Result<(), CacheError> {
        self.cache.remove(&credential_key(credential)).await
    }
}

fn provider_outcome(e: &ProviderError) -> &'static str {
    match e {
        ProviderError::MissingCredential => "missing",
        ProviderError::Rejected(_) => "rejected",
        ProviderError::Malformed(_) => "malformed",
        ProviderError::Transport(_) => "transport",
        ProviderError::Timeout(_) => "timeout",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::MemoryUserStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that accepts "tok1" as Ada and counts calls
    struct CountingProvider {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl IdentityProvider for CountingProvider {
        fn identity_type(&self) -> &str {
            "facebook"
        }

        async fn verify(&self, credential: &str) -> Result<ExternalIdentity, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match credential {
                "tok1" => Ok(ExternalIdentity::new("42", "Ada")),
                _ => Err(ProviderError::Rejected("unknown token".to_string())),
            }
        }
    }

    fn create_test_service(delay: Duration) -> (IdentityService, Arc<CountingProvider>) {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            delay,
        });
        let service = IdentityService::new(
            provider.clone(),
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryUserStore::new()),
            IdentityServiceConfig {
                provider_timeout: Duration::from_millis(100),
                cache_ttl: None,
            },
        );
        (service, provider)
    }

    #[tokio::test]
    async fn test_resolve_caches_identity() {
        let (service, provider) = create_test_service(Duration::ZERO);

        let first = service.resolve("tok1").await.unwrap();
        let second = service.resolve("tok1").await.unwrap();

        assert_eq!(first.internal_id, second.internal_id);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_credential_is_unauthenticated() {
        let (service, _) = create_test_service(Duration::ZERO);

        let result = service.resolve("bogus").await;
        assert!(matches!(result, Err(AuthError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn test_empty_credential_never_reaches_provider() {
        let (service, provider) = create_test_service(Duration::ZERO);

        let result = service.resolve("").await;
        assert!(matches!(result, Err(AuthError::Unauthenticated(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_timeout_is_unauthenticated() {
        let (service, _) = create_test_service(Duration::from_millis(500));

        let result = service.resolve("tok1").await;
        assert!(matches!(result, Err(AuthError::Unauthenticated(ref msg)) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_invalidate_forces_provider_call() {
        let (service, provider) = create_test_service(Duration::ZERO);

        service.resolve("tok1").await.unwrap();
        service.invalidate("tok1").await.unwrap();
        service.resolve("tok1").await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
