/// Permission Resolution System
///
/// Answers "does this principal currently hold capability X" with a
/// positive-only cache in front of an authoritative resolver.

pub mod resolvers;
pub mod service;

pub use resolvers::{AllowListResolver, ContributionResolver};
pub use service::{PermissionService, PermissionServiceConfig};

use crate::error::{AuthError, AuthResult, ResolverError};
use crate::store::User;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity a capability is evaluated for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub identity_type: String,
    pub identity_id: String,
}

impl Principal {
    pub fn new(identity_type: impl Into<String>, identity_id: impl Into<String>) -> Self {
        Self {
            identity_type: identity_type.into(),
            identity_id: identity_id.into(),
        }
    }

    /// Principal for a resolved user, evaluated over its external identity
    pub fn for_user(identity_type: &str, user: &User) -> Self {
        Self::new(identity_type, user.external_id.clone())
    }

    /// Cache key for this principal. The identity type may not contain the
    /// key separator, or two principals could share one entry.
    pub fn key(&self) -> AuthResult<PermissionKey> {
        if self.identity_type.is_empty() || self.identity_type.contains(':') {
            return Err(AuthError::Validation(format!(
                "Invalid identity type '{}'",
                self.identity_type
            )));
        }
        if self.identity_id.is_empty() {
            return Err(AuthError::Validation("Empty identity id".to_string()));
        }

        Ok(PermissionKey {
            identity_type: self.identity_type.clone(),
            identity_id: self.identity_id.clone(),
        })
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.identity_type, self.identity_id)
    }
}

/// Permission cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionKey {
    pub identity_type: String,
    pub identity_id: String,
}

impl PermissionKey {
    /// Key within the permission cache category
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.identity_type, self.identity_id)
    }

    /// Parse a `type:id` pair, splitting on the first colon
    pub fn parse(s: &str) -> AuthResult<Self> {
        match s.trim().split_once(':') {
            Some((identity_type, identity_id))
                if !identity_type.is_empty() && !identity_id.is_empty() =>
            {
                Ok(Self {
                    identity_type: identity_type.to_string(),
                    identity_id: identity_id.to_string(),
                })
            }
            _ => Err(AuthError::Validation(format!(
                "Invalid principal '{}', expected type:id",
                s
            ))),
        }
    }
}

/// The capability being requested.
///
/// Grants are cached per principal only, so the set of capabilities is
/// closed: anything other than `browse_records` is refused at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityContext {
    capability: &'static str,
}

impl CapabilityContext {
    /// Parse a capability name
    pub fn parse(capability: &str) -> AuthResult<Self> {
        match capability.trim() {
            capabilities::BROWSE_RECORDS => Ok(Self {
                capability: capabilities::BROWSE_RECORDS,
            }),
            other => Err(AuthError::Validation(format!(
                "Unknown capability '{}'",
                other
            ))),
        }
    }

    pub fn capability(&self) -> &'static str {
        self.capability
    }
}

impl Default for CapabilityContext {
    fn default() -> Self {
        Self {
            capability: capabilities::BROWSE_RECORDS,
        }
    }
}

/// Capability name constants
pub mod capabilities {
    /// Read other people's salary and interview records
    pub const BROWSE_RECORDS: &str = "browse_records";
}

/// Authoritative capability check
#[async_trait]
pub trait PermissionResolver: Send + Sync {
    /// Short resolver name for logs and metrics
    fn name(&self) -> &'static str;

    async fn evaluate(
        &self,
        principal: &Principal,
        context: &CapabilityContext,
    ) -> Result<bool, ResolverError>;
}
