//! HTTP utilities for ARM REST API calls.

use crate::error::{Error, Result};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging: truncate and strip non-printable
/// characters.
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..MAX_LOG_BODY_LENGTH],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Map a non-success management-plane status to the error taxonomy. 404 is
/// kept distinguishable from transport/auth failure so per-item absence can
/// be reported without aborting sibling requests.
fn status_error(status: StatusCode, url: &str) -> Error {
    let path = reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    match status {
        StatusCode::NOT_FOUND => Error::ResourceNotFound { id: path },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::provider(format!(
            "request rejected ({status}); check AZURE_* credentials and role assignments"
        )),
        StatusCode::TOO_MANY_REQUESTS => Error::provider("rate limit exceeded"),
        s if s.is_server_error() => Error::provider(format!("management API error: {status}")),
        _ => Error::Enumeration(format!("unexpected status {status} for {path}")),
    }
}

/// HTTP client wrapper for ARM API calls.
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
}

impl ArmHttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("azgov/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::provider(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(token)
            .header("x-ms-client-request-id", uuid::Uuid::new_v4().to_string())
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Value> {
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(status_error(status, url));
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::Enumeration(format!("failed to parse response JSON: {e}")))
    }

    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        self.send(self.request(Method::GET, url, token), url).await
    }

    pub async fn post(&self, url: &str, token: &str, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("POST {}", url);
        let mut request = self.request(Method::POST, url, token);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request, url).await
    }

    pub async fn patch(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        tracing::debug!("PATCH {}", url);
        self.send(self.request(Method::PATCH, url, token).json(body), url)
            .await
    }

    pub async fn put(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        tracing::debug!("PUT {}", url);
        self.send(self.request(Method::PUT, url, token).json(body), url)
            .await
    }

    pub async fn delete(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("DELETE {}", url);
        self.send(self.request(Method::DELETE, url, token), url)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_resource_not_found() {
        let err = status_error(
            StatusCode::NOT_FOUND,
            "https://management.azure.com/subscriptions/S1/resourceGroups/RG/providers/Microsoft.Example/widgets/w?api-version=1",
        );
        match err {
            Error::ResourceNotFound { id } => {
                assert_eq!(
                    id,
                    "/subscriptions/S1/resourceGroups/RG/providers/Microsoft.Example/widgets/w"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn auth_failures_map_to_provider_unavailable() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            assert!(matches!(
                status_error(status, "https://management.azure.com/x"),
                Error::ProviderUnavailable { .. }
            ));
        }
    }

    #[test]
    fn server_errors_map_to_provider_unavailable() {
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "https://m/x"),
            Error::ProviderUnavailable { .. }
        ));
    }

    #[test]
    fn other_statuses_are_enumeration_errors() {
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "https://m/x"),
            Error::Enumeration(_)
        ));
    }

    #[test]
    fn log_sanitizer_truncates_and_strips() {
        let long = "a".repeat(300) + "\u{7}";
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.contains("truncated"));
        assert!(!sanitized.contains('\u{7}'));
    }
}
