/// SQLite-backed user store
use super::{NewUser, User, UserStore};
use crate::error::StoreError;
use crate::identity::ExternalIdentity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

/// User store over the `users` table
#[derive(Clone)]
pub struct SqliteUserStore {
    db: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Number of stored users
    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT internal_id, external_id, display_name, created_at
            FROM users
            WHERE external_id = ?1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let internal_id: String = row.try_get("internal_id")?;
        let external_id: String = row.try_get("external_id")?;
        let display_name: String = row.try_get("display_name")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Some(User {
            internal_id: Uuid::parse_str(&internal_id)
                .map_err(|e| StoreError::Internal(format!("Invalid internal id: {}", e)))?,
            external_identity: ExternalIdentity::new(external_id.clone(), display_name),
            external_id,
            created_at: parse_timestamp(&created_at)?,
        }))
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let internal_id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (internal_id, external_id, display_name, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(internal_id.to_string())
        .bind(&user.external_id)
        .bind(&user.external_identity.display_name)
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                debug!("Insert lost uniqueness race for {}", user.external_id);
                StoreError::DuplicateKey(user.external_id.clone())
            }
            other => StoreError::Database(other),
        })?;

        Ok(User {
            internal_id,
            external_id: user.external_id,
            external_identity: user.external_identity,
            created_at: now,
        })
    }
}

/// Parse RFC3339 timestamp
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Internal(format!("Invalid timestamp: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn create_test_store() -> SqliteUserStore {
        let pool = db::in_memory_pool().await.unwrap();
        SqliteUserStore::new(pool)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = create_test_store().await;

        let created = store
            .insert(ExternalIdentity::new("42", "Ada").into())
            .await
            .unwrap();
        assert_eq!(created.external_id, "42");

        let found = store.find_by_external_id("42").await.unwrap().unwrap();
        assert_eq!(found.internal_id, created.internal_id);
        assert_eq!(found.external_identity.display_name, "Ada");

        assert!(store.find_by_external_id("43").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_external_id_is_reported() {
        let store = create_test_store().await;

        store
            .insert(ExternalIdentity::new("42", "Ada").into())
            .await
            .unwrap();
        let second = store
            .insert(ExternalIdentity::new("42", "Ada Lovelace").into())
            .await;

        assert!(matches!(second, Err(StoreError::DuplicateKey(ref id)) if id == "42"));
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
