use secrecy::SecretString;
use serde::Deserialize;

use atl::{builder::ClientBuilder, fields::FieldConfig, AppError, CircuitRegistry, ResilienceConfig};

const DEFAULT_LOG_ROTATE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_LOG_ROTATE_KEEP: usize = 5;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub jira: ServiceConfig,
    pub confluence: ServiceConfig,
    pub fields: FieldConfig,
    pub resilience: ResilienceConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for one Atlassian product.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<SecretString>,
    /// Environment variable holding the token, checked before `api_token`.
    pub api_token_env: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub path: Option<String>,
    pub rotate_size: u64,
    pub rotate_keep: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: None,
            rotate_size: DEFAULT_LOG_ROTATE_SIZE,
            rotate_keep: DEFAULT_LOG_ROTATE_KEEP,
        }
    }
}

impl AppConfig {
    /// Applies `JIRA_*` / `CONFLUENCE_*` variables over the file values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.jira.apply_env("JIRA", &lookup);
        self.confluence.apply_env("CONFLUENCE", &lookup);
    }
}

impl ServiceConfig {
    fn apply_env<F>(&mut self, prefix: &str, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{prefix}_{name}")).filter(|v| !v.is_empty());
        if let Some(url) = var("BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(email) = var("EMAIL") {
            self.email = Some(email);
        }
        let token = var("API_TOKEN").or_else(|| {
            self.api_token_env
                .as_deref()
                .and_then(|name| lookup(name))
                .filter(|v| !v.is_empty())
        });
        if let Some(token) = token {
            self.api_token = Some(SecretString::new(token));
        }
    }

    /// Client builder for this service; missing settings surface as
    /// `CONFIG_ERROR` when the client is built.
    pub fn builder(&self, resilience: &ResilienceConfig, registry: &CircuitRegistry) -> ClientBuilder {
        let mut builder = ClientBuilder::new()
            .resilience(resilience.clone())
            .registry(registry.clone());
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url);
        }
        if let Some(email) = &self.email {
            builder = builder.email(email);
        }
        if let Some(token) = &self.api_token {
            builder = builder.api_token_secret(token.clone());
        }
        if let Some(timeout) = self.timeout_seconds {
            builder = builder.timeout_seconds(timeout);
        }
        builder
    }

    pub fn require_configured(&self, service: &str) -> Result<(), AppError> {
        if self.base_url.is_none() {
            return Err(AppError::config(format!(
                "{service} is not configured; set [{}] base_url in the config file or {}_BASE_URL",
                service.to_lowercase(),
                service.to_uppercase()
            )));
        }
        Ok(())
    }
}
