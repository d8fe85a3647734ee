//! HTTP adapter for the backend REST API (reqwest)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

use rulehaunt_shared::ErrorBody;

use crate::ports::outbound::{ApiError, RawApiPort};

/// Default backend REST base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Default REST request timeout in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// `RawApiPort` over HTTP
#[derive(Clone)]
pub struct ApiAdapter {
    client: Client,
    base_url: String,
}

impl ApiAdapter {
    /// Adapter with [`DEFAULT_REQUEST_TIMEOUT_MS`]; `PlayerConfig` supplies overrides.
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute(
        &self,
        method: &'static str,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Value, ApiError> {
        tracing::debug!(method, path, "REST request");

        let response = request.send().await.map_err(|e| {
            tracing::warn!(method, path, error = %e, "REST request failed");
            ApiError::Network(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(status, &text);
            tracing::debug!(
                method,
                path,
                status = status.as_u16(),
                message = %message,
                "REST error response"
            );
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::ParseError(e.to_string()))
    }
}

impl Default for ApiAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

#[async_trait]
impl RawApiPort for ApiAdapter {
    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        self.execute("GET", path, self.client.get(self.url(path))).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let request = self.client.post(self.url(path)).json(body);
        self.execute("POST", path, request).await
    }

    async fn post_empty_with_response_json(&self, path: &str) -> Result<Value, ApiError> {
        self.execute("POST", path, self.client.post(self.url(path))).await
    }

    async fn delete_json(&self, path: &str) -> Result<Value, ApiError> {
        self.execute("DELETE", path, self.client.delete(self.url(path))).await
    }
}

/// Message for a non-2xx response: the body's `message`/`detail`, else the status text.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.best_message())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_body_detail() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"detail":"Insufficient fear points"}"#),
            "Insufficient fear points"
        );
    }

    #[test]
    fn error_message_falls_back_to_status_text() {
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, "<html>nope</html>"),
            "Not Found"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "{}"), "Bad Gateway");
    }

    #[test]
    fn url_joins_without_double_slash() {
        let adapter = ApiAdapter::with_timeout("http://localhost:8000/", Duration::from_secs(1));
        assert_eq!(adapter.url("/api/games"), "http://localhost:8000/api/games");
        assert_eq!(adapter.url("health"), "http://localhost:8000/health");
    }
}
