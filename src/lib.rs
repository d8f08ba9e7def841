//! Payscope identity and permission core
//!
//! Resolves opaque bearer credentials to durable users and answers capability
//! checks, with a volatile cache in front of the identity provider and the
//! permission resolver. The cache is advisory: an outage costs latency, never
//! a different answer.

pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod guard;
pub mod identity;
pub mod jobs;
pub mod metrics;
pub mod permission;
pub mod store;

pub use error::{AuthError, AuthResult};
