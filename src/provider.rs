//! Raw provider operations consumed by the resilient clients.
//!
//! Implementations perform exactly one request per call and report failures
//! as [`ProviderError`]; retrying, circuit breaking and normalization happen
//! in [`crate::client`].

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;

/// Body of a response whose content type is not guaranteed to be JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

#[async_trait]
pub trait JiraApi: Send + Sync {
    async fn get_issue(&self, key: &str, fields: &[String]) -> Result<Value, ProviderError>;

    /// Runs a JQL search returning a single page of at most `max_results`.
    async fn search(
        &self,
        jql: &str,
        max_results: u32,
        fields: &[String],
    ) -> Result<ResponseBody, ProviderError>;

    async fn create_issue(&self, payload: &Value) -> Result<Value, ProviderError>;

    async fn edit_issue(&self, key: &str, payload: &Value) -> Result<(), ProviderError>;

    async fn get_transitions(&self, key: &str) -> Result<Value, ProviderError>;

    async fn do_transition(&self, key: &str, transition_id: &str) -> Result<(), ProviderError>;

    async fn get_fields(&self) -> Result<Value, ProviderError>;
}

#[async_trait]
pub trait ConfluenceApi: Send + Sync {
    async fn get_content_by_id(&self, id: &str) -> Result<Value, ProviderError>;

    /// Looks pages up by space and exact title.
    async fn get_content(&self, space_key: &str, title: &str) -> Result<Value, ProviderError>;

    async fn update_content(&self, id: &str, payload: &Value) -> Result<Value, ProviderError>;

    async fn create_content(&self, payload: &Value) -> Result<Value, ProviderError>;

    async fn search_content_by_cql(&self, cql: &str, limit: u32) -> Result<Value, ProviderError>;
}
