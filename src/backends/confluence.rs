//! Confluence content REST API over reqwest.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::{error::ProviderError, provider::ConfluenceApi};

use super::http::{read_json, send, HttpConfig};

const CONTENT: &str = "/rest/api/content";
const EXPAND: &str = "body.storage,version,space";

#[derive(Debug, Clone)]
pub struct ConfluenceHttp {
    pub config: Arc<HttpConfig>,
    pub client: Client,
}

impl ConfluenceHttp {
    pub fn new(config: HttpConfig) -> Result<Self, ProviderError> {
        let client = config.client()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: HttpConfig) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        self.config.url(&format!("{CONTENT}{path}"))
    }
}

#[async_trait]
impl ConfluenceApi for ConfluenceHttp {
    async fn get_content_by_id(&self, id: &str) -> Result<Value, ProviderError> {
        let request = self
            .client
            .get(self.url(&format!("/{id}")))
            .query(&[("expand", EXPAND)]);
        let response = send(self.config.authorize(request), "Confluence get page").await?;
        read_json(response).await
    }

    async fn get_content(&self, space_key: &str, title: &str) -> Result<Value, ProviderError> {
        let request = self.client.get(self.url("")).query(&[
            ("spaceKey", space_key),
            ("title", title),
            ("expand", EXPAND),
        ]);
        let response = send(self.config.authorize(request), "Confluence find page").await?;
        read_json(response).await
    }

    async fn update_content(&self, id: &str, payload: &Value) -> Result<Value, ProviderError> {
        let request = self
            .client
            .put(self.url(&format!("/{id}")))
            .json(payload);
        let response = send(self.config.authorize(request), "Confluence update page").await?;
        read_json(response).await
    }

    async fn create_content(&self, payload: &Value) -> Result<Value, ProviderError> {
        let request = self.client.post(self.url("")).json(payload);
        let response = send(self.config.authorize(request), "Confluence create page").await?;
        read_json(response).await
    }

    async fn search_content_by_cql(&self, cql: &str, limit: u32) -> Result<Value, ProviderError> {
        let request = self.client.get(self.url("/search")).query(&[
            ("cql", cql.to_string()),
            ("limit", limit.to_string()),
            ("expand", EXPAND.to_string()),
        ]);
        let response = send(self.config.authorize(request), "Confluence search").await?;
        read_json(response).await
    }
}
