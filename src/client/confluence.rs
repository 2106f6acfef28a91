use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::AppError,
    models::{CreatePageInput, Page, PageResults, UpdatePageInput},
    normalize::normalize_confluence_error,
    provider::ConfluenceApi,
    resilience::{CircuitRegistry, ResilienceConfig},
};

use super::guard::CallGuard;

/// Confluence counterpart of [`super::ResilientJiraClient`].
pub struct ResilientConfluenceClient {
    api: Arc<dyn ConfluenceApi>,
    guard: CallGuard,
}

impl ResilientConfluenceClient {
    pub const SERVICE: &'static str = "confluence";

    pub fn new(
        api: Arc<dyn ConfluenceApi>,
        registry: CircuitRegistry,
        cfg: ResilienceConfig,
    ) -> Self {
        Self {
            api,
            guard: CallGuard::new(Self::SERVICE, registry, cfg, normalize_confluence_error),
        }
    }

    pub fn with_service_name(mut self, service: impl Into<String>) -> Self {
        self.guard.service = service.into();
        self
    }

    pub fn service_name(&self) -> &str {
        &self.guard.service
    }

    pub fn registry(&self) -> &CircuitRegistry {
        &self.guard.registry
    }

    pub async fn get_page_by_id(&self, id: &str) -> Result<Page, AppError> {
        let raw = self
            .guard
            .run("getPageById", || self.api.get_content_by_id(id))
            .await?;
        decode(raw, "page")
    }

    /// First page in `space_key` titled exactly `title`, if any.
    pub async fn get_page_by_title(
        &self,
        space_key: &str,
        title: &str,
    ) -> Result<Option<Page>, AppError> {
        let raw = self
            .guard
            .run("getPageByTitle", || self.api.get_content(space_key, title))
            .await?;
        let results: PageResults = decode(raw, "page list")?;
        Ok(results.results.into_iter().next())
    }

    pub async fn search(&self, cql: &str, limit: u32) -> Result<PageResults, AppError> {
        let raw = self
            .guard
            .run("search", || self.api.search_content_by_cql(cql, limit))
            .await?;
        decode(raw, "search results")
    }

    pub async fn create_page(&self, input: &CreatePageInput) -> Result<Page, AppError> {
        if input.title.trim().is_empty() {
            return Err(AppError::validation("page title must not be empty"));
        }
        let payload = input.to_payload();
        let raw = self
            .guard
            .run("createPage", || self.api.create_content(&payload))
            .await?;
        decode(raw, "created page")
    }

    /// Replaces a page's title and body.
    ///
    /// Without an explicit version the current page is read first and the
    /// update is sent as the next version.
    pub async fn update_page(&self, input: &UpdatePageInput) -> Result<Page, AppError> {
        let version = match input.version {
            Some(version) => version,
            None => {
                let current = self.get_page_by_id(&input.id).await?;
                let number = current.version_number().ok_or_else(|| {
                    AppError::confluence_api(
                        format!("page {} has no version information", input.id),
                        None,
                    )
                })?;
                number + 1
            }
        };
        let payload = input.to_payload(version);
        let raw = self
            .guard
            .run("updatePage", || self.api.update_content(&input.id, &payload))
            .await?;
        decode(raw, "updated page")
    }
}

fn decode<T: DeserializeOwned>(raw: Value, what: &str) -> Result<T, AppError> {
    serde_json::from_value(raw).map_err(|err| {
        AppError::confluence_api(format!("unexpected Confluence {what} response: {err}"), None)
            .with_cause(err)
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::{ErrorCode, ProviderError};

    #[derive(Default)]
    struct FakeConfluence {
        pages: Mutex<VecDeque<Result<Value, ProviderError>>>,
        updates: Mutex<Vec<(String, Value)>>,
        lookups: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ConfluenceApi for FakeConfluence {
        async fn get_content_by_id(&self, _id: &str) -> Result<Value, ProviderError> {
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Generic("no page".to_string())))
        }

        async fn get_content(&self, space_key: &str, title: &str) -> Result<Value, ProviderError> {
            self.lookups
                .lock()
                .unwrap()
                .push((space_key.to_string(), title.to_string()));
            Ok(json!({ "results": [], "size": 0 }))
        }

        async fn update_content(&self, id: &str, payload: &Value) -> Result<Value, ProviderError> {
            self.updates
                .lock()
                .unwrap()
                .push((id.to_string(), payload.clone()));
            Ok(json!({
                "id": id,
                "title": payload["title"],
                "type": "page",
                "version": payload["version"]
            }))
        }

        async fn create_content(&self, payload: &Value) -> Result<Value, ProviderError> {
            Ok(json!({ "id": "900", "title": payload["title"], "type": "page" }))
        }

        async fn search_content_by_cql(
            &self,
            _cql: &str,
            _limit: u32,
        ) -> Result<Value, ProviderError> {
            Err(ProviderError::Http {
                message: "Request failed with status code 400".to_string(),
                status: 400,
                status_text: None,
                data: Some(json!({ "message": "Could not parse cql : type = ???" })),
            })
        }
    }

    fn client(fake: Arc<FakeConfluence>) -> ResilientConfluenceClient {
        ResilientConfluenceClient::new(
            fake,
            CircuitRegistry::new(),
            ResilienceConfig {
                jitter: false,
                ..ResilienceConfig::defaults()
            },
        )
    }

    #[tokio::test]
    async fn update_without_version_bumps_current() {
        let fake = Arc::new(FakeConfluence::default());
        fake.pages.lock().unwrap().push_back(Ok(json!({
            "id": "42",
            "title": "Runbook",
            "type": "page",
            "version": { "number": 6 }
        })));
        let confluence = client(Arc::clone(&fake));

        let page = confluence
            .update_page(&UpdatePageInput {
                id: "42".to_string(),
                title: "Runbook v2".to_string(),
                body: "<p>new</p>".to_string(),
                version: None,
            })
            .await
            .unwrap();

        assert_eq!(page.version_number(), Some(7));
        let updates = fake.updates.lock().unwrap();
        assert_eq!(updates[0].0, "42");
        assert_eq!(updates[0].1["version"]["number"], 7);
    }

    #[tokio::test]
    async fn explicit_version_skips_lookup() {
        let fake = Arc::new(FakeConfluence::default());
        let confluence = client(Arc::clone(&fake));

        let page = confluence
            .update_page(&UpdatePageInput {
                id: "42".to_string(),
                title: "Runbook".to_string(),
                body: "<p>x</p>".to_string(),
                version: Some(3),
            })
            .await
            .unwrap();

        assert_eq!(page.version_number(), Some(3));
    }

    #[tokio::test]
    async fn missing_title_lookup_returns_none() {
        let fake = Arc::new(FakeConfluence::default());
        let confluence = client(Arc::clone(&fake));

        let page = confluence.get_page_by_title("DOC", "Nope").await.unwrap();

        assert!(page.is_none());
        assert_eq!(
            *fake.lookups.lock().unwrap(),
            vec![("DOC".to_string(), "Nope".to_string())]
        );
    }

    #[tokio::test]
    async fn search_errors_use_confluence_message() {
        let confluence = client(Arc::new(FakeConfluence::default()));

        let err = confluence.search("type = ???", 10).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::ConfluenceApiError);
        assert_eq!(err.status_code, Some(400));
        assert_eq!(err.message, "Could not parse cql : type = ???");
    }

    #[tokio::test]
    async fn create_requires_title() {
        let confluence = client(Arc::new(FakeConfluence::default()));
        let input = CreatePageInput {
            space_key: "DOC".to_string(),
            title: "  ".to_string(),
            body: String::new(),
            parent_id: None,
        };

        let err = confluence.create_page(&input).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let created = confluence
            .create_page(&CreatePageInput {
                title: "Runbook".to_string(),
                ..input
            })
            .await
            .unwrap();
        assert_eq!(created.id, "900");
    }
}
