//! Raw API Port - Object-safe HTTP boundary
//!
//! Typed request/response methods are generic and therefore not object-safe.
//! `RawApiPort` exchanges `serde_json::Value`s so the composition root can hold
//! an `Arc<dyn RawApiPort>`; `application::api::GameApi` adds the typing on top.

use serde_json::Value;

use super::ApiError;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RawApiPort: Send + Sync {
    async fn get_json(&self, path: &str) -> Result<Value, ApiError>;

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ApiError>;

    /// POST without a request body
    async fn post_empty_with_response_json(&self, path: &str) -> Result<Value, ApiError>;

    async fn delete_json(&self, path: &str) -> Result<Value, ApiError>;
}
