//! ARM authentication.
//!
//! Supports a pre-issued static token or the AAD client-credentials flow,
//! with expiry-buffered token caching.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default scope for management-plane API access.
pub const DEFAULT_SCOPE: &str = "https://management.azure.com/.default";

/// AAD authority, overridable via `AZURE_AUTHORITY_HOST`.
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Token expiry buffer - refresh tokens this much before they actually
/// expire, so a token is never mid-request when it lapses.
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if the token response carries no expiry.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone)]
enum CredentialSource {
    /// Pre-issued bearer token, e.g. from `az account get-access-token`.
    StaticToken(String),
    ClientSecret {
        authority: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

/// ARM credentials holder with token caching.
#[derive(Clone)]
pub struct ArmCredentials {
    source: CredentialSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
    http: reqwest::Client,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl ArmCredentials {
    /// Build credentials from the environment: `AZURE_ACCESS_TOKEN` for a
    /// static token, otherwise the `AZURE_TENANT_ID` / `AZURE_CLIENT_ID` /
    /// `AZURE_CLIENT_SECRET` triple for the client-credentials flow.
    pub fn from_env() -> Result<Self> {
        if let Ok(token) = std::env::var("AZURE_ACCESS_TOKEN") {
            return Ok(Self::static_token(&token));
        }

        let tenant_id = std::env::var("AZURE_TENANT_ID").ok();
        let client_id = std::env::var("AZURE_CLIENT_ID").ok();
        let client_secret = std::env::var("AZURE_CLIENT_SECRET").ok();
        match (tenant_id, client_id, client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                let authority = std::env::var("AZURE_AUTHORITY_HOST")
                    .unwrap_or_else(|_| DEFAULT_AUTHORITY.to_string());
                Ok(Self {
                    source: CredentialSource::ClientSecret {
                        authority,
                        tenant_id,
                        client_id,
                        client_secret,
                    },
                    token_cache: Arc::new(RwLock::new(None)),
                    http: reqwest::Client::new(),
                })
            }
            _ => Err(Error::provider(
                "no credentials configured; set AZURE_ACCESS_TOKEN or the \
                 AZURE_TENANT_ID/AZURE_CLIENT_ID/AZURE_CLIENT_SECRET triple",
            )),
        }
    }

    /// Credentials around a pre-issued bearer token.
    pub fn static_token(token: &str) -> Self {
        Self {
            source: CredentialSource::StaticToken(token.to_string()),
            token_cache: Arc::new(RwLock::new(None)),
            http: reqwest::Client::new(),
        }
    }

    /// Get an access token for API calls, from cache while still valid.
    pub async fn get_token(&self) -> Result<String> {
        let (authority, tenant_id, client_id, client_secret) = match &self.source {
            CredentialSource::StaticToken(token) => return Ok(token.clone()),
            CredentialSource::ClientSecret {
                authority,
                tenant_id,
                client_id,
                client_secret,
            } => (authority, tenant_id, client_id, client_secret),
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("cached token expired, fetching new token");
            }
        }

        let url = format!("{authority}/{tenant_id}/oauth2/v2.0/token");
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", DEFAULT_SCOPE),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::provider(format!(
                "token request failed: {status}; check AZURE_* credentials"
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(format!("malformed token response: {e}")))?;

        let ttl = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.access_token.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "new token cached, expires in ~{} minutes",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token.access_token)
    }

    /// Force refresh the token.
    pub async fn refresh_token(&self) -> Result<String> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }
        self.get_token().await
    }

    /// The principal operating through these credentials, when known.
    pub fn principal(&self) -> Option<String> {
        match &self.source {
            CredentialSource::ClientSecret { client_id, .. } => Some(client_id.clone()),
            CredentialSource::StaticToken(_) => None,
        }
    }
}
