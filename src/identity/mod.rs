/// Identity Resolution System
///
/// Turns an opaque bearer credential into a durable user record: identity
/// provider lookup, cache-aside identity caching, and lazy user creation.

pub mod provider;
pub mod service;

pub use provider::{FacebookProvider, FacebookProviderConfig};
pub use service::{IdentityService, IdentityServiceConfig};

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque bearer credential. Never printed in full.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Identity as known to the third-party provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub external_id: String,
    pub display_name: String,
}

impl ExternalIdentity {
    pub fn new(external_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// External identity provider
///
/// Implementations verify a bearer credential and return the stable identity
/// behind it. Any error means the caller is not authenticated.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identity type used for permission keys (e.g. "facebook")
    fn identity_type(&self) -> &str;

    /// Verify a credential
    async fn verify(&self, credential: &str) -> Result<ExternalIdentity, ProviderError>;
}
