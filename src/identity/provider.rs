/// Facebook Graph API identity provider
use crate::{
    error::{AuthError, AuthResult, ProviderError},
    identity::{ExternalIdentity, IdentityProvider},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Provider configuration
#[derive(Debug, Clone)]
pub struct FacebookProviderConfig {
    /// Graph API base URL, without trailing slash
    pub base_url: String,
    /// User-Agent header for HTTP requests
    pub user_agent: String,
    /// Transport-level timeout
    pub timeout: Duration,
}

impl Default for FacebookProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com/v19.0".to_string(),
            user_agent: concat!("payscope/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// `/me` response body
#[derive(Debug, Deserialize)]
struct GraphMe {
    id: Option<String>,
    name: Option<String>,
}

/// Verifies user access tokens against the Graph API `/me` endpoint
#[derive(Clone)]
pub struct FacebookProvider {
    http_client: reqwest::Client,
    config: FacebookProviderConfig,
}

impl FacebookProvider {
    pub fn new(config: FacebookProviderConfig) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn me_url(&self) -> String {
        format!("{}/me", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl IdentityProvider for FacebookProvider {
    fn identity_type(&self) -> &str {
        "facebook"
    }

    async fn verify(&self, credential: &str) -> Result<ExternalIdentity, ProviderError> {
        if credential.trim().is_empty() {
            return Err(ProviderError::MissingCredential);
        }

        let response = self
            .http_client
            .get(self.me_url())
            .query(&[("fields", "id,name"), ("access_token", credential)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.config.timeout)
                } else {
                    ProviderError::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!("Graph API rejected credential with status {}", status);
            return Err(ProviderError::Rejected(format!("status {}", status)));
        }

        let me: GraphMe = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.without_url().to_string()))?;

        match me.id {
            Some(id) if !id.is_empty() => Ok(ExternalIdentity::new(id, me.name.unwrap_or_default())),
            _ => Err(ProviderError::Malformed("response has no id".to_string())),
        }
    }
}
