/// Unified error types for the Payscope identity core
use thiserror::Error;

/// Main error type surfaced by the identity and permission services
#[derive(Error, Debug)]
pub enum AuthError {
    /// Credential missing, malformed, or rejected by the identity provider
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    /// The permission resolver could not reach a decision
    #[error("Permission resolver failure: {0}")]
    ResolverFailure(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal errors, including a duplicate-key race that survives the re-read
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cache backend failure. Always absorbed by the services.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache encoding failed: {0}")]
    Encoding(String),
}

/// Durable user store failure
#[derive(Error, Debug)]
pub enum StoreError {
    /// Uniqueness constraint on `external_id` rejected the insert
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Internal(String),
}

/// Identity provider failure. Every variant maps to `AuthError::Unauthenticated`.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("missing credential")]
    MissingCredential,

    #[error("credential rejected: {0}")]
    Rejected(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider unreachable: {0}")]
    Transport(String),

    #[error("provider timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Permission resolver failure. Propagated as `AuthError::ResolverFailure`.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("resolver backend error: {0}")]
    Backend(String),

    #[error("resolver timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<sqlx::Error> for ResolverError {
    fn from(e: sqlx::Error) -> Self {
        ResolverError::Backend(e.to_string())
    }
}

impl From<ProviderError> for AuthError {
    fn from(e: ProviderError) -> Self {
        AuthError::Unauthenticated(e.to_string())
    }
}

impl From<ResolverError> for AuthError {
    fn from(e: ResolverError) -> Self {
        AuthError::ResolverFailure(e.to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => AuthError::Database(e),
            StoreError::DuplicateKey(key) => {
                AuthError::Internal(format!("duplicate user for external id {}", key))
            }
            StoreError::Internal(msg) => AuthError::Internal(msg),
        }
    }
}

/// Result type alias for identity core operations
pub type AuthResult<T> = Result<T, AuthError>;
