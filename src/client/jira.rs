use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    creation::IssueCreator,
    error::AppError,
    fields::FieldCatalog,
    models::{CreatedIssue, Issue, JiraField, SearchResults, Transition, TransitionList},
    normalize::normalize_jira_error,
    provider::{JiraApi, ResponseBody},
    resilience::{CircuitRegistry, ResilienceConfig},
};

use super::guard::CallGuard;

/// Jira client that routes every call through the circuit breaker and
/// retrier, returning normalized [`AppError`]s.
pub struct ResilientJiraClient {
    api: Arc<dyn JiraApi>,
    guard: CallGuard,
}

impl ResilientJiraClient {
    pub const SERVICE: &'static str = "jira";

    pub fn new(api: Arc<dyn JiraApi>, registry: CircuitRegistry, cfg: ResilienceConfig) -> Self {
        Self {
            api,
            guard: CallGuard::new(Self::SERVICE, registry, cfg, normalize_jira_error),
        }
    }

    /// Tracks health under a different circuit name, e.g. one per site.
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

    pub fn resilience(&self) -> &ResilienceConfig {
        &self.guard.cfg
    }

    pub async fn get_issue(&self, key: &str, fields: &[String]) -> Result<Issue, AppError> {
        let raw = self
            .guard
            .run("getIssue", || self.api.get_issue(key, fields))
            .await?;
        decode(raw, "issue")
    }

    pub async fn search(
        &self,
        jql: &str,
        max_results: u32,
        fields: &[String],
    ) -> Result<SearchResults, AppError> {
        let body = self
            .guard
            .run("search", || self.api.search(jql, max_results, fields))
            .await?;
        parse_search_body(body)
    }

    pub async fn create_issue(&self, payload: &Value) -> Result<CreatedIssue, AppError> {
        let raw = self
            .guard
            .run("createIssue", || self.api.create_issue(payload))
            .await?;
        decode(raw, "created issue")
    }

    pub async fn update_issue(&self, key: &str, payload: &Value) -> Result<(), AppError> {
        self.guard
            .run("updateIssue", || self.api.edit_issue(key, payload))
            .await
    }

    pub async fn get_transitions(&self, key: &str) -> Result<Vec<Transition>, AppError> {
        let raw = self
            .guard
            .run("getTransitions", || self.api.get_transitions(key))
            .await?;
        let list: TransitionList = decode(raw, "transition list")?;
        Ok(list.transitions)
    }

    /// Moves an issue through the workflow.
    ///
    /// `target` is a transition id, or a transition or status name matched
    /// case-insensitively against the transitions currently available.
    pub async fn transition_issue(&self, key: &str, target: &str) -> Result<Transition, AppError> {
        let transitions = self.get_transitions(key).await?;
        let Some(transition) = transitions.iter().find(|t| t.matches(target)).cloned() else {
            return Err(no_matching_transition(key, target, &transitions));
        };
        self.guard
            .run("transitionIssue", || {
                self.api.do_transition(key, &transition.id)
            })
            .await?;
        log::info!("{key} transitioned via '{}'", transition.name);
        Ok(transition)
    }

    pub async fn list_fields(&self) -> Result<Vec<JiraField>, AppError> {
        let raw = self.guard.run("getFields", || self.api.get_fields()).await?;
        decode(raw, "field list")
    }
}

#[async_trait]
impl FieldCatalog for ResilientJiraClient {
    async fn list_fields(&self) -> Result<Vec<JiraField>, AppError> {
        ResilientJiraClient::list_fields(self).await
    }
}

#[async_trait]
impl IssueCreator for ResilientJiraClient {
    async fn create_issue(&self, payload: &Value) -> Result<CreatedIssue, AppError> {
        ResilientJiraClient::create_issue(self, payload).await
    }
}

/// Turns a search response into results.
///
/// Jira answers an unauthenticated request with its HTML login page, so a
/// text body starting with `<` is reported as a 401 instead of a parse error.
pub fn parse_search_body(body: ResponseBody) -> Result<SearchResults, AppError> {
    let value = match body {
        ResponseBody::Json(value) => value,
        ResponseBody::Text(text) => {
            if text.trim_start().starts_with('<') {
                return Err(AppError::jira_api(
                    "Jira returned an HTML page instead of JSON; authentication failed or the session expired",
                    Some(401),
                ));
            }
            serde_json::from_str(&text).map_err(|err| {
                AppError::jira_api(
                    format!("failed to parse Jira search response as JSON: {err}"),
                    None,
                )
                .with_cause(err)
            })?
        }
    };
    decode(value, "search results")
}

fn decode<T: DeserializeOwned>(raw: Value, what: &str) -> Result<T, AppError> {
    serde_json::from_value(raw).map_err(|err| {
        AppError::jira_api(format!("unexpected Jira {what} response: {err}"), None).with_cause(err)
    })
}

fn no_matching_transition(key: &str, target: &str, transitions: &[Transition]) -> AppError {
    let available = if transitions.is_empty() {
        "none".to_string()
    } else {
        transitions
            .iter()
            .map(|t| format!("{} ({})", t.name, t.id))
            .collect::<Vec<_>>()
            .join(", ")
    };
    AppError::validation(format!(
        "no transition matching '{target}' for {key}; available: {available}"
    ))
    .with_context(serde_json::json!({
        "issue": key,
        "transitions": transitions,
    }))
}

#[cfg(test)]
#[path = "jira_tests.rs"]
mod tests;
