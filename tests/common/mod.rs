//! Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use payscope::cache::CacheBackend;
use payscope::error::{CacheError, ProviderError, ResolverError, StoreError};
use payscope::identity::{ExternalIdentity, IdentityProvider};
use payscope::permission::{CapabilityContext, PermissionResolver, Principal};
use payscope::store::{NewUser, User, UserStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

/// Provider answering from a fixed credential table
pub struct ScriptedProvider {
    identities: HashMap<String, ExternalIdentity>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(entries: &[(&str, &str, &str)]) -> Self {
        Self {
            identities: entries
                .iter()
                .map(|(credential, id, name)| {
                    (credential.to_string(), ExternalIdentity::new(*id, *name))
                })
                .collect(),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// "tok1" is Ada (42), "tok2" is Grace (7)
    pub fn standard() -> Self {
        Self::new(&[("tok1", "42", "Ada"), ("tok2", "7", "Grace")])
    }

    /// Make every subsequent call fail as unreachable
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    fn identity_type(&self) -> &str {
        "facebook"
    }

    async fn verify(&self, credential: &str) -> Result<ExternalIdentity, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Transport("connection refused".to_string()));
        }
        if credential.is_empty() {
            return Err(ProviderError::MissingCredential);
        }

        self.identities
            .get(credential)
            .cloned()
            .ok_or_else(|| ProviderError::Rejected("Invalid OAuth access token".to_string()))
    }
}

const GRANT: u8 = 0;
const DENY: u8 = 1;
const FAIL: u8 = 2;

/// Resolver whose answer can be switched between grant, deny and fail
pub struct ScriptedResolver {
    mode: AtomicU8,
    calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn granting() -> Self {
        Self::with_mode(GRANT)
    }

    pub fn denying() -> Self {
        Self::with_mode(DENY)
    }

    pub fn failing() -> Self {
        Self::with_mode(FAIL)
    }

    fn with_mode(mode: u8) -> Self {
        Self {
            mode: AtomicU8::new(mode),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn grant(&self) {
        self.mode.store(GRANT, Ordering::SeqCst);
    }

    pub fn deny(&self) {
        self.mode.store(DENY, Ordering::SeqCst);
    }

    pub fn fail(&self) {
        self.mode.store(FAIL, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionResolver for ScriptedResolver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn evaluate(
        &self,
        _principal: &Principal,
        _context: &CapabilityContext,
    ) -> Result<bool, ResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode.load(Ordering::SeqCst) {
            GRANT => Ok(true),
            DENY => Ok(false),
            _ => Err(ResolverError::Backend("policy store unreachable".to_string())),
        }
    }
}

/// Cache whose every operation fails
#[derive(Default)]
pub struct FailingCache {
    calls: AtomicUsize,
}

impl FailingCache {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn unavailable(&self) -> CacheError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        CacheError::Unavailable("connection reset by peer".to_string())
    }
}

#[async_trait]
impl CacheBackend for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(self.unavailable())
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Err(self.unavailable())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(self.unavailable())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(self.unavailable())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Store wrapper that holds the first `n` inserts until all of them arrive,
/// so every racer has already missed on lookup before anyone commits
pub struct RacingStore {
    inner: Arc<dyn UserStore>,
    barrier: Barrier,
    racers: usize,
    inserts: AtomicUsize,
    duplicates: AtomicUsize,
}

impl RacingStore {
    pub fn new(inner: Arc<dyn UserStore>, racers: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(racers),
            racers,
            inserts: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
        }
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for RacingStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_by_external_id(external_id).await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        if self.inserts.fetch_add(1, Ordering::SeqCst) < self.racers {
            self.barrier.wait().await;
        }

        let result = self.inner.insert(user).await;
        if matches!(result, Err(StoreError::DuplicateKey(_))) {
            self.duplicates.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

/// Store whose inserts always collide and whose lookups never find anything
pub struct PhantomDuplicateStore;

#[async_trait]
impl UserStore for PhantomDuplicateStore {
    async fn find_by_external_id(&self, _external_id: &str) -> Result<Option<User>, StoreError> {
        Ok(None)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        Err(StoreError::DuplicateKey(user.external_id))
    }
}
