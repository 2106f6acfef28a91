use std::sync::Arc;

use secrecy::SecretString;

use crate::{
    backends::{ConfluenceHttp, JiraHttp},
    client::{ResilientConfluenceClient, ResilientJiraClient},
    error::AppError,
    normalize::{normalize_confluence_error, normalize_jira_error},
};

use super::state::BuilderState;

/// Builder for resilient Jira and Confluence clients backed by reqwest.
///
/// Clients built without an explicit [`ClientBuilder::registry`] get a
/// fresh one each.
#[derive(Default)]
pub struct ClientBuilder {
    pub(super) state: BuilderState,
}

impl ClientBuilder {
    /// Creates a new empty builder instance with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the site URL, e.g. `https://example.atlassian.net`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.state.base_url = Some(url.into());
        self
    }

    /// Sets the account email used for basic auth.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.state.email = Some(email.into());
        self
    }

    /// Sets the API token for authentication.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.state.api_token = Some(SecretString::new(token.into()));
        self
    }

    pub fn api_token_secret(mut self, token: SecretString) -> Self {
        self.state.api_token = Some(token);
        self
    }

    /// Sets the HTTP request timeout in seconds.
    pub fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.state.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Circuit name used instead of `jira` / `confluence`.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.state.service_name = Some(name.into());
        self
    }

    pub fn build_jira(self) -> Result<ResilientJiraClient, AppError> {
        let http = self.state.http_config(ResilientJiraClient::SERVICE)?;
        let api = JiraHttp::new(http).map_err(normalize_jira_error)?;
        let cfg = self.state.resilience_config();
        log::debug!(
            "building Jira client for {} (attempts={}, threshold={})",
            api.config.base_url,
            cfg.max_attempts,
            cfg.failure_threshold
        );
        let client = ResilientJiraClient::new(
            Arc::new(api),
            self.state.registry.unwrap_or_default(),
            cfg,
        );
        Ok(match self.state.service_name {
            Some(name) => client.with_service_name(name),
            None => client,
        })
    }

    pub fn build_confluence(self) -> Result<ResilientConfluenceClient, AppError> {
        let http = self.state.http_config(ResilientConfluenceClient::SERVICE)?;
        let api = ConfluenceHttp::new(http).map_err(normalize_confluence_error)?;
        let cfg = self.state.resilience_config();
        log::debug!(
            "building Confluence client for {} (attempts={}, threshold={})",
            api.config.base_url,
            cfg.max_attempts,
            cfg.failure_threshold
        );
        let client = ResilientConfluenceClient::new(
            Arc::new(api),
            self.state.registry.unwrap_or_default(),
            cfg,
        );
        Ok(match self.state.service_name {
            Some(name) => client.with_service_name(name),
            None => client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorCode, resilience::ResilienceConfig, CircuitRegistry};

    #[test]
    fn missing_settings_are_config_errors() {
        let err = ClientBuilder::new()
            .email("me@example.com")
            .api_token("t")
            .build_jira()
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::ConfigError);
        assert!(err.message.contains("base URL"));

        let err = ClientBuilder::new()
            .base_url("https://example.atlassian.net")
            .email("me@example.com")
            .build_confluence()
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::ConfigError);
        assert!(err.message.contains("API token"));

        let err = ClientBuilder::new()
            .base_url("example.atlassian.net")
            .email("me@example.com")
            .api_token("t")
            .build_jira()
            .err()
            .unwrap();
        assert!(err.message.contains("http"));
    }

    #[test]
    fn setters_override_base_resilience() {
        let registry = CircuitRegistry::new();
        let jira = ClientBuilder::new()
            .base_url("https://example.atlassian.net")
            .email("me@example.com")
            .api_token("t")
            .resilience(ResilienceConfig {
                failure_threshold: 9,
                ..ResilienceConfig::defaults()
            })
            .resilient_attempts(5)
            .resilient_backoff(10, 100)
            .resilient_jitter(false)
            .request_timeout_ms(2_000)
            .registry(registry.clone())
            .service_name("jira-eu")
            .build_jira()
            .unwrap();

        let cfg = jira.resilience();
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!((cfg.base_delay_ms, cfg.max_delay_ms), (10, 100));
        assert!(!cfg.jitter);
        assert_eq!(cfg.failure_threshold, 9);
        assert_eq!(cfg.request_timeout_ms, Some(2_000));
        assert_eq!(jira.service_name(), "jira-eu");

        assert_eq!(jira.registry().circuit_stats("jira-eu").failure_count, 0);
    }
}
