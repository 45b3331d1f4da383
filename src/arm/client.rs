//! ARM client.
//!
//! Main client for the Azure management plane, combining authentication and
//! HTTP functionality, plus the provider operations the resource managers
//! consume: `list`, `get_by_id`, and per-id API version resolution.

use super::auth::ArmCredentials;
use super::http::ArmHttpClient;
use crate::error::{Error, Result};
use crate::identity;
use crate::registry::catalog;
use crate::registry::types::{EnumSpec, ResourceRecord};
use serde_json::Value;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Fallback for ids whose type no descriptor declares; the generic
/// resources API accepts it for most types.
const DEFAULT_RESOURCE_API_VERSION: &str = "2021-04-01";

/// Main ARM client.
#[derive(Clone)]
pub struct ArmClient {
    pub credentials: ArmCredentials,
    pub http: ArmHttpClient,
    pub subscription_id: String,
    pub endpoint: String,
}

impl ArmClient {
    /// Create a new ARM client with credentials from the environment.
    pub fn new(subscription_id: &str, endpoint: &str) -> Result<Self> {
        Ok(Self {
            credentials: ArmCredentials::from_env()?,
            http: ArmHttpClient::new()?,
            subscription_id: subscription_id.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Client around a pre-issued bearer token.
    pub fn with_token(endpoint: &str, subscription_id: &str, token: &str) -> Self {
        Self {
            credentials: ArmCredentials::static_token(token),
            http: ArmHttpClient::new().expect("default HTTP client"),
            subscription_id: subscription_id.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// The principal operating through this client, when known.
    pub fn principal(&self) -> Option<String> {
        self.credentials.principal()
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Build a subscription-scoped URL.
    pub fn subscription_url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}/subscriptions/{}/{}?api-version={}",
            self.endpoint, self.subscription_id, path, api_version
        )
    }

    /// Build a URL under an absolute resource path (a resource id, or a
    /// provider path appended to one). The path carries its leading slash.
    pub fn resource_url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    /// `resource_url` with extra query parameters, percent-encoded.
    pub fn resource_url_with_params(
        &self,
        path: &str,
        api_version: &str,
        params: &[(&str, &str)],
    ) -> Result<String> {
        let mut url = Url::parse(&self.resource_url(path, api_version))
            .map_err(|e| Error::Enumeration(format!("invalid request url: {e}")))?;
        for (key, value) in params {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(url.into())
    }

    // =========================================================================
    // Provider operations
    // =========================================================================

    /// List resources per an enumeration spec, following `nextLink`
    /// continuations until the listing is exhausted.
    pub async fn list(&self, spec: &EnumSpec) -> Result<Vec<ResourceRecord>> {
        let url = self.list_url(&self.subscription_url(&spec.path, &spec.api_version), spec)?;
        self.drain_pages(url).await
    }

    /// List child resources under a parent resource id.
    pub async fn list_children(
        &self,
        parent_id: &str,
        spec: &EnumSpec,
    ) -> Result<Vec<ResourceRecord>> {
        let path = format!("{}/{}", parent_id.trim_end_matches('/'), spec.path);
        let url = self.list_url(&self.resource_url(&path, &spec.api_version), spec)?;
        self.drain_pages(url).await
    }

    fn list_url(&self, base: &str, spec: &EnumSpec) -> Result<String> {
        let Some(params) = spec.params.as_object() else {
            return Ok(base.to_string());
        };
        let mut url =
            Url::parse(base).map_err(|e| Error::Enumeration(format!("invalid list url: {e}")))?;
        for (key, value) in params {
            if let Some(value) = value.as_str() {
                url.query_pairs_mut().append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    async fn drain_pages(&self, first: String) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next {
            let response = self.get(&url).await?;
            let page = response
                .get("value")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::Enumeration("list response missing 'value'".into()))?;
            records.extend(page.iter().cloned());
            next = response
                .get("nextLink")
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        Ok(records)
    }

    /// Fetch one resource by id at an explicit API version.
    pub async fn get_by_id(&self, resource_id: &str, api_version: &str) -> Result<ResourceRecord> {
        let record = self
            .get(&self.resource_url(resource_id, api_version))
            .await
            .map_err(|e| match e {
                // Re-anchor absence on the requested id rather than the URL.
                Error::ResourceNotFound { .. } => Error::ResourceNotFound {
                    id: resource_id.to_string(),
                },
                other => other,
            })?;
        if !record.is_object() {
            return Err(Error::Enumeration(format!(
                "get-by-id response for '{resource_id}' is not an object"
            )));
        }
        Ok(record)
    }

    /// Resolve the API version to use for an arbitrary resource id: the
    /// declaring descriptor's version when the type is in the catalog, the
    /// generic default otherwise. Subscription-scope ids (resource groups)
    /// have no provider segment and use the default.
    pub fn resource_api_version(&self, resource_id: &str) -> Result<String> {
        match identity::arm_type(resource_id) {
            Ok(arm_type) => Ok(catalog()
                .api_version_for(&arm_type)
                .unwrap_or(DEFAULT_RESOURCE_API_VERSION)
                .to_string()),
            Err(_) => {
                identity::subscription(resource_id)?;
                Ok(DEFAULT_RESOURCE_API_VERSION.to_string())
            }
        }
    }

    // =========================================================================
    // Raw verbs
    // =========================================================================

    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.post(url, &token, body).await
    }

    pub async fn patch(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.patch(url, &token, body).await
    }

    pub async fn put(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.put(url, &token, body).await
    }

    pub async fn delete(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.delete(url, &token).await
    }
}
