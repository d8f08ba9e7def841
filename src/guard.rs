/// Access guard for upstream callers
///
/// Collapses identity and permission outcomes into two uniform refusals.
/// Internally a denial and a resolver failure are still logged apart.
use crate::{
    error::AuthError,
    identity::{Credential, IdentityService},
    permission::{CapabilityContext, PermissionService, Principal},
    store::User,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// What an upstream caller is told
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("not authorized")]
    NotAuthorized,
}

/// Identity + permission front door
#[derive(Clone)]
pub struct AccessGuard {
    identity: IdentityService,
    permission: PermissionService,
}

impl AccessGuard {
    pub fn new(identity: IdentityService, permission: PermissionService) -> Self {
        Self {
            identity,
            permission,
        }
    }

    /// Resolve a credential, refusing uniformly on any failure
    pub async fn authenticate(&self, credential: &Credential) -> Result<User, Denied> {
        match self.identity.resolve(credential.as_str()).await {
            Ok(user) => Ok(user),
            Err(AuthError::Unauthenticated(reason)) => {
                info!("Authentication refused: {}", reason);
                Err(Denied::NotAuthenticated)
            }
            Err(e) => {
                error!("Authentication failed on an internal error: {}", e);
                Err(Denied::NotAuthenticated)
            }
        }
    }

    /// Check a capability, refusing uniformly on denial or resolver failure
    pub async fn authorize(
        &self,
        principal: &Principal,
        context: &CapabilityContext,
    ) -> Result<(), Denied> {
        match self.permission.authorize(principal, context).await {
            Ok(true) => {
                debug!("{} granted {}", principal, context.capability());
                Ok(())
            }
            Ok(false) => {
                info!("{} denied {}", principal, context.capability());
                Err(Denied::NotAuthorized)
            }
            Err(e) => {
                warn!(
                    "Could not determine {} for {}: {}",
                    context.capability(), principal, e
                );
                Err(Denied::NotAuthorized)
            }
        }
    }

    /// Authenticate, then authorize the resolved user
    pub async fn admit(
        &self,
        credential: &Credential,
        context: &CapabilityContext,
    ) -> Result<User, Denied> {
        let user = self.authenticate(credential).await?;
        let principal = Principal::for_user(self.identity.identity_type(), &user);
        self.authorize(&principal, context).await?;
        Ok(user)
    }
}
