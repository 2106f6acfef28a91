use secrecy::SecretString;

use crate::{
    backends::HttpConfig,
    error::AppError,
    resilience::{CircuitRegistry, ResilienceConfig},
};

#[derive(Default)]
pub(crate) struct BuilderState {
    pub(crate) base_url: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) api_token: Option<SecretString>,
    pub(crate) timeout_seconds: Option<u64>,
    pub(crate) service_name: Option<String>,
    pub(crate) registry: Option<CircuitRegistry>,
    pub(crate) resilience: Option<ResilienceConfig>,
    pub(crate) resilient_attempts: Option<u32>,
    pub(crate) resilient_base_delay_ms: Option<u64>,
    pub(crate) resilient_max_delay_ms: Option<u64>,
    pub(crate) resilient_jitter: Option<bool>,
    pub(crate) request_timeout_ms: Option<u64>,
    pub(crate) failure_threshold: Option<u32>,
    pub(crate) reset_timeout_ms: Option<u64>,
}

impl BuilderState {
    /// Explicit resilience settings layered over the base config.
    pub(crate) fn resilience_config(&self) -> ResilienceConfig {
        let mut cfg = self
            .resilience
            .clone()
            .unwrap_or_else(ResilienceConfig::defaults);
        if let Some(attempts) = self.resilient_attempts {
            cfg.max_attempts = attempts;
        }
        if let Some(base) = self.resilient_base_delay_ms {
            cfg.base_delay_ms = base;
        }
        if let Some(max) = self.resilient_max_delay_ms {
            cfg.max_delay_ms = max;
        }
        if let Some(jitter) = self.resilient_jitter {
            cfg.jitter = jitter;
        }
        if let Some(timeout) = self.request_timeout_ms {
            cfg.request_timeout_ms = Some(timeout);
        }
        if let Some(threshold) = self.failure_threshold {
            cfg.failure_threshold = threshold;
        }
        if let Some(reset) = self.reset_timeout_ms {
            cfg.reset_timeout_ms = reset;
        }
        cfg
    }

    pub(crate) fn http_config(&self, service: &str) -> Result<HttpConfig, AppError> {
        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::config(format!("No base URL provided for {service}")))?;
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(AppError::config(format!(
                "{service} base URL must start with http:// or https://, got '{base_url}'"
            )));
        }
        let email = self
            .email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| AppError::config(format!("No email provided for {service}")))?;
        let api_token = self
            .api_token
            .clone()
            .ok_or_else(|| AppError::config(format!("No API token provided for {service}")))?;
        let mut config = HttpConfig::new(base_url, email, api_token);
        config.timeout_seconds = self.timeout_seconds;
        Ok(config)
    }
}
