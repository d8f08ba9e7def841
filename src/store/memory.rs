/// In-process user store
use super::{NewUser, User, UserStore};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// User store backed by a DashMap keyed by `external_id`.
///
/// The map's entry API gives the same insert-if-absent guarantee a unique
/// index gives the SQL store.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<String, User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(external_id).map(|user| user.clone()))
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        match self.users.entry(user.external_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(user.external_id)),
            Entry::Vacant(slot) => {
                let created = User {
                    internal_id: Uuid::new_v4(),
                    external_id: user.external_id,
                    external_identity: user.external_identity,
                    created_at: Utc::now(),
                };
                slot.insert(created.clone());
                Ok(created)
            }
        }
    }
}
