/// Permission resolvers
use super::{CapabilityContext, PermissionKey, PermissionResolver, Principal};
use crate::error::{AuthResult, ResolverError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;

/// Grants a capability to principals that have contributed records.
///
/// Browsing salary and interview data is unlocked by sharing at least
/// `min_contributions` records of one's own.
#[derive(Clone)]
pub struct ContributionResolver {
    db: SqlitePool,
    min_contributions: i64,
}

impl ContributionResolver {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            min_contributions: 1,
        }
    }

    pub fn with_min_contributions(mut self, min_contributions: i64) -> Self {
        self.min_contributions = min_contributions.max(1);
        self
    }

    /// Count contributions by a principal
    pub async fn contribution_count(&self, principal: &Principal) -> Result<i64, ResolverError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM contributions
            WHERE author_type = ?1 AND author_id = ?2
            "#,
        )
        .bind(&principal.identity_type)
        .bind(&principal.identity_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    /// Record a contribution. The review platform owns these rows; this is
    /// exposed for seeding and tests.
    pub async fn record_contribution(&self, principal: &Principal, kind: &str) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO contributions (author_type, author_id, kind, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&principal.identity_type)
        .bind(&principal.identity_id)
        .bind(kind)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PermissionResolver for ContributionResolver {
    fn name(&self) -> &'static str {
        "contribution"
    }

    async fn evaluate(
        &self,
        principal: &Principal,
        _context: &CapabilityContext,
    ) -> Result<bool, ResolverError> {
        Ok(self.contribution_count(principal).await? >= self.min_contributions)
    }
}

/// Grants configured principals outright, deferring everyone else to an
/// optional fallback resolver
#[derive(Clone)]
pub struct AllowListResolver {
    allowed: HashSet<PermissionKey>,
    fallback: Option<Arc<dyn PermissionResolver>>,
}

impl AllowListResolver {
    pub fn new(allowed: impl IntoIterator<Item = PermissionKey>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            fallback: None,
        }
    }

    /// Consult `fallback` for principals not on the list
    pub fn or_else(mut self, fallback: Arc<dyn PermissionResolver>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

#[async_trait]
impl PermissionResolver for AllowListResolver {
    fn name(&self) -> &'static str {
        "allow_list"
    }

    async fn evaluate(
        &self,
        principal: &Principal,
        context: &CapabilityContext,
    ) -> Result<bool, ResolverError> {
        if matches!(principal.key(), Ok(key) if self.allowed.contains(&key)) {
            return Ok(true);
        }

        match &self.fallback {
            Some(fallback) => fallback.evaluate(principal, context).await,
            None => Ok(false),
        }
    }
}
