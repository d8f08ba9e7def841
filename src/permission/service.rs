/// Permission Service - positive-only cache in front of a resolver
use crate::{
    cache::{categories, CacheBackend, TypedCache},
    error::{AuthResult, CacheError, ResolverError},
    metrics::{self, CacheOutcome},
    permission::{CapabilityContext, PermissionResolver, Principal},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Permission service configuration
#[derive(Debug, Clone)]
pub struct PermissionServiceConfig {
    /// Upper bound on a resolver evaluation; expiry is a resolver failure
    pub resolver_timeout: Duration,
    /// Grant cache TTL; `None` keeps grants until flushed
    pub cache_ttl: Option<Duration>,
}

impl Default for PermissionServiceConfig {
    fn default() -> Self {
        Self {
            resolver_timeout: Duration::from_secs(5),
            cache_ttl: None,
        }
    }
}

/// Authorizes principals for capabilities.
///
/// Only grants are cached. A denial always goes back to the resolver, so a
/// principal who becomes eligible is granted on the next call.
#[derive(Clone)]
pub struct PermissionService {
    resolver: Arc<dyn PermissionResolver>,
    cache: TypedCache,
    config: PermissionServiceConfig,
}

impl PermissionService {
    pub fn new(
        resolver: Arc<dyn PermissionResolver>,
        cache: Arc<dyn CacheBackend>,
        config: PermissionServiceConfig,
    ) -> Self {
        Self {
            resolver,
            cache: TypedCache::new(cache, categories::PERMISSION, config.cache_ttl),
            config,
        }
    }

    /// Decide whether `principal` holds the capability.
    ///
    /// `Ok(false)` is a real denial. A resolver that errors or times out is
    /// `AuthError::ResolverFailure`, never a denial. A principal that cannot
    /// be keyed unambiguously is `AuthError::Validation` and never reaches
    /// the cache or the resolver.
    pub async fn authorize(
        &self,
        principal: &Principal,
        context: &CapabilityContext,
    ) -> AuthResult<bool> {
        let key = principal.key()?.cache_key();

        match self.cache.get::<bool>(&key).await {
            Ok(Some(true)) => {
                metrics::record_cache_lookup("permission", CacheOutcome::Hit);
                metrics::record_authorization("cache", "granted");
                debug!("Permission cache hit for {}", principal);
                return Ok(true);
            }
            // A stored `false` is never written by this service; treat it as absent
            Ok(_) => {
                metrics::record_cache_lookup("permission", CacheOutcome::Miss);
            }
            Err(e) => {
                metrics::record_cache_lookup("permission", CacheOutcome::Error);
                warn!("Permission cache read failed, treating as miss: {}", e);
            }
        }

        let granted = self.evaluate(principal, context).await?;

        if granted {
            metrics::record_authorization("resolver", "granted");
            if let Err(e) = self.cache.set(&key, &true).await {
                metrics::record_cache_write_failure("permission");
                warn!("Permission cache write failed, continuing: {}", e);
            }
        } else {
            metrics::record_authorization("resolver", "denied");
            debug!(
                "Resolver {} denied {} for {}",
                self.resolver.name(),
                context.capability(),
                principal
            );
        }

        Ok(granted)
    }

    async fn evaluate(
        &self,
        principal: &Principal,
        context: &CapabilityContext,
    ) -> AuthResult<bool> {
        let started = Instant::now();

        let result = match tokio::time::timeout(
            self.config.resolver_timeout,
            self.resolver.evaluate(principal, context),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ResolverError::Timeout(self.config.resolver_timeout)),
        };

        metrics::record_resolver_duration(self.resolver.name(), started.elapsed().as_secs_f64());

        result.map_err(|e| {
            metrics::record_authorization("resolver", "error");
            warn!(
                "Resolver {} failed for {}: {}",
                self.resolver.name(),
                principal,
                e
            );
            e.into()
        })
    }

    /// Drop a cached grant so the next call consults the resolver
    pub async fn revoke_cached(&self, principal: &Principal) -> Result<(), CacheError> {
        match principal.key() {
            Ok(key) => self.cache.remove(&key.cache_key()).await,
            // Nothing can have been cached for an unkeyable principal
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::AuthError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Resolver with a switchable answer that counts evaluations
    struct SwitchResolver {
        grant: AtomicBool,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl SwitchResolver {
        fn new(grant: bool) -> Self {
            Self {
                grant: AtomicBool::new(grant),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PermissionResolver for SwitchResolver {
        fn name(&self) -> &'static str {
            "switch"
        }

        async fn evaluate(
            &self,
            _principal: &Principal,
            _context: &CapabilityContext,
        ) -> Result<bool, ResolverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ResolverError::Backend("unreachable".to_string()));
            }
            Ok(self.grant.load(Ordering::SeqCst))
        }
    }

    /// Resolver that never answers in time
    struct StalledResolver;

    #[async_trait]
    impl PermissionResolver for StalledResolver {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn evaluate(
            &self,
            _principal: &Principal,
            _context: &CapabilityContext,
        ) -> Result<bool, ResolverError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(true)
        }
    }

    fn create_test_service(
        resolver: Arc<dyn PermissionResolver>,
    ) -> (PermissionService, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let service = PermissionService::new(
            resolver,
            cache.clone(),
            PermissionServiceConfig {
                resolver_timeout: Duration::from_millis(100),
                cache_ttl: None,
            },
        );
        (service, cache)
    }

    #[tokio::test]
    async fn test_grant_is_cached() {
        let resolver = Arc::new(SwitchResolver::new(true));
        let (service, cache) = create_test_service(resolver.clone());
        let principal = Principal::new("facebook", "42");
        let context = CapabilityContext::default();

        assert!(service.authorize(&principal, &context).await.unwrap());
        assert!(service.authorize(&principal, &context).await.unwrap());

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.get("permission:facebook:42").await.unwrap().as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_denial_is_never_cached() {
        let resolver = Arc::new(SwitchResolver::new(false));
        let (service, cache) = create_test_service(resolver.clone());
        let principal = Principal::new("facebook", "42");
        let context = CapabilityContext::default();

        assert!(!service.authorize(&principal, &context).await.unwrap());
        assert!(cache.is_empty());

        // Becoming eligible takes effect on the next call
        resolver.grant.store(true, Ordering::SeqCst);
        assert!(service.authorize(&principal, &context).await.unwrap());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_false_is_treated_as_miss() {
        let resolver = Arc::new(SwitchResolver::new(true));
        let (service, cache) = create_test_service(resolver.clone());
        cache
            .set("permission:facebook:42", "false".to_string(), None)
            .await
            .unwrap();

        let granted = service
            .authorize(&Principal::new("facebook", "42"), &CapabilityContext::default())
            .await
            .unwrap();

        assert!(granted);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolver_failure_is_not_a_denial() {
        let resolver = Arc::new(SwitchResolver::new(true));
        resolver.fail.store(true, Ordering::SeqCst);
        let (service, cache) = create_test_service(resolver);

        let result = service
            .authorize(&Principal::new("facebook", "42"), &CapabilityContext::default())
            .await;

        assert!(matches!(result, Err(AuthError::ResolverFailure(_))));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cached_grant_survives_resolver_outage() {
        let resolver = Arc::new(SwitchResolver::new(true));
        let (service, _) = create_test_service(resolver.clone());
        let principal = Principal::new("facebook", "42");
        let context = CapabilityContext::default();

        assert!(service.authorize(&principal, &context).await.unwrap());
        resolver.fail.store(true, Ordering::SeqCst);
        assert!(service.authorize(&principal, &context).await.unwrap());
    }

    #[tokio::test]
    async fn test_resolver_timeout_is_failure() {
        let (service, _) = create_test_service(Arc::new(StalledResolver));

        let result = service
            .authorize(&Principal::new("facebook", "42"), &CapabilityContext::default())
            .await;

        assert!(matches!(result, Err(AuthError::ResolverFailure(ref msg)) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_revoke_cached_forces_reevaluation() {
        let resolver = Arc::new(SwitchResolver::new(true));
        let (service, _) = create_test_service(resolver.clone());
        let principal = Principal::new("facebook", "42");
        let context = CapabilityContext::default();

        assert!(service.authorize(&principal, &context).await.unwrap());
        service.revoke_cached(&principal).await.unwrap();

        resolver.grant.store(false, Ordering::SeqCst);
        assert!(!service.authorize(&principal, &context).await.unwrap());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_colliding_principals_do_not_share_a_grant() {
        let resolver = Arc::new(SwitchResolver::new(true));
        let (service, cache) = create_test_service(resolver.clone());
        let context = CapabilityContext::default();

        assert!(service
            .authorize(&Principal::new("a", "b:c"), &context)
            .await
            .unwrap());
        assert_eq!(cache.len(), 1);

        // ("a:b", "c") renders the same key and must not pick up that grant
        resolver.grant.store(false, Ordering::SeqCst);
        let result = service
            .authorize(&Principal::new("a:b", "c"), &context)
            .await;

        assert!(matches!(result, Err(AuthError::Validation(_))));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        service
            .revoke_cached(&Principal::new("a:b", "c"))
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);
    }
}
