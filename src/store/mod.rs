/// Durable user store
///
/// Authoritative record of internal users keyed by external identity.
/// Uniqueness of `external_id` is enforced by the backend, never by locks
/// in this crate; a losing concurrent insert surfaces as `StoreError::DuplicateKey`.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryUserStore;
pub use sqlite::SqliteUserStore;

use crate::error::StoreError;
use crate::identity::ExternalIdentity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub internal_id: Uuid,
    pub external_id: String,
    pub external_identity: ExternalIdentity,
    pub created_at: DateTime<Utc>,
}

/// User to be created; the store assigns `internal_id` and `created_at`
#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_id: String,
    pub external_identity: ExternalIdentity,
}

impl From<ExternalIdentity> for NewUser {
    fn from(identity: ExternalIdentity) -> Self {
        Self {
            external_id: identity.external_id.clone(),
            external_identity: identity,
        }
    }
}

/// User persistence backend
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user. Fails with `StoreError::DuplicateKey` if `external_id` exists.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
}
