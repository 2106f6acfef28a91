//! Jira Cloud/Server REST API v2 over reqwest.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::{
    error::ProviderError,
    provider::{JiraApi, ResponseBody},
};

use super::http::{read_body, read_json, send, HttpConfig};

const API: &str = "/rest/api/2";

/// Raw Jira client. Failures come back as undecorated [`ProviderError`]s;
/// wrap it in [`crate::ResilientJiraClient`] for retries and normalization.
#[derive(Debug, Clone)]
pub struct JiraHttp {
    pub config: Arc<HttpConfig>,
    pub client: Client,
}

impl JiraHttp {
    pub fn new(config: HttpConfig) -> Result<Self, ProviderError> {
        let client = config.client()?;
        Ok(Self::with_client(client, config))
    }

    /// Creates a client around an existing reqwest client.
    pub fn with_client(client: Client, config: HttpConfig) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        self.config.url(&format!("{API}{path}"))
    }
}

#[async_trait]
impl JiraApi for JiraHttp {
    async fn get_issue(&self, key: &str, fields: &[String]) -> Result<Value, ProviderError> {
        let mut request = self.client.get(self.url(&format!("/issue/{key}")));
        if !fields.is_empty() {
            request = request.query(&[("fields", fields.join(","))]);
        }
        let response = send(self.config.authorize(request), "Jira get issue").await?;
        read_json(response).await
    }

    async fn search(
        &self,
        jql: &str,
        max_results: u32,
        fields: &[String],
    ) -> Result<ResponseBody, ProviderError> {
        let mut query = vec![
            ("jql", jql.to_string()),
            ("maxResults", max_results.to_string()),
        ];
        if !fields.is_empty() {
            query.push(("fields", fields.join(",")));
        }
        let request = self.client.get(self.url("/search")).query(&query);
        let response = send(self.config.authorize(request), "Jira search").await?;
        read_body(response).await
    }

    async fn create_issue(&self, payload: &Value) -> Result<Value, ProviderError> {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("Jira create payload: {payload}");
        }
        let request = self.client.post(self.url("/issue")).json(payload);
        let response = send(self.config.authorize(request), "Jira create issue").await?;
        read_json(response).await
    }

    async fn edit_issue(&self, key: &str, payload: &Value) -> Result<(), ProviderError> {
        let request = self
            .client
            .put(self.url(&format!("/issue/{key}")))
            .json(payload);
        send(self.config.authorize(request), "Jira edit issue").await?;
        Ok(())
    }

    async fn get_transitions(&self, key: &str) -> Result<Value, ProviderError> {
        let request = self.client.get(self.url(&format!("/issue/{key}/transitions")));
        let response = send(self.config.authorize(request), "Jira transitions").await?;
        read_json(response).await
    }

    async fn do_transition(&self, key: &str, transition_id: &str) -> Result<(), ProviderError> {
        let request = self
            .client
            .post(self.url(&format!("/issue/{key}/transitions")))
            .json(&json!({ "transition": { "id": transition_id } }));
        send(self.config.authorize(request), "Jira transition").await?;
        Ok(())
    }

    async fn get_fields(&self) -> Result<Value, ProviderError> {
        let request = self.client.get(self.url("/field"));
        let response = send(self.config.authorize(request), "Jira fields").await?;
        read_json(response).await
    }
}
