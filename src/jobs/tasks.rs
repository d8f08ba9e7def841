/// Background task implementations
use crate::{
    context::AppContext,
    error::{AuthError, AuthResult},
};

/// Drop expired entries from the in-process cache
pub fn purge_memory_cache(ctx: &AppContext) -> AuthResult<usize> {
    match &ctx.memory_cache {
        Some(cache) => Ok(cache.purge_expired()),
        None => Ok(0),
    }
}

/// Health check - verify all systems are operational
///
/// A cache outage is reported but the service keeps answering without it.
pub async fn health_check(ctx: &AppContext) -> AuthResult<()> {
    // Check database connectivity
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;

    // Check cache connectivity
    ctx.cache.ping().await.map_err(|e| {
        AuthError::Internal(format!("{} cache unhealthy: {}", ctx.cache.name(), e))
    })?;

    // All checks passed
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheBackend;
    use crate::config::ServiceConfig;
    use crate::db;
    use std::time::Duration;

    async fn create_test_context() -> AppContext {
        let pool = db::in_memory_pool().await.unwrap();
        AppContext::with_pool(ServiceConfig::default(), pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check_passes() {
        let ctx = create_test_context().await;
        health_check(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_health_check_fails_without_database() {
        let ctx = create_test_context().await;
        ctx.db.close().await;
        assert!(health_check(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_purge_memory_cache() {
        let ctx = create_test_context().await;
        ctx.cache
            .set("short", "1".to_string(), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        ctx.cache.set("long", "1".to_string(), None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(purge_memory_cache(&ctx).unwrap(), 1);
        assert_eq!(ctx.memory_cache.as_ref().unwrap().len(), 1);
    }
}
