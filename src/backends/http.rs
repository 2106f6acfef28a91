use std::time::Duration;

use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::{error::ProviderError, provider::ResponseBody};

/// Connection settings shared by the Jira and Confluence backends.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Site root, e.g. `https://example.atlassian.net` (Confluence Cloud adds `/wiki`).
    pub base_url: String,
    pub email: String,
    pub api_token: SecretString,
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
}

impl HttpConfig {
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        api_token: SecretString,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            email: email.into(),
            api_token,
            timeout_seconds: None,
        }
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn client(&self) -> Result<Client, ProviderError> {
        let mut builder = Client::builder();
        if let Some(sec) = self.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(sec));
        }
        Ok(builder.build()?)
    }

    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.email, Some(self.api_token.expose_secret()))
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

/// Sends `request` and turns non-2xx responses into [`ProviderError::Http`]
/// carrying the decoded body.
pub(crate) async fn send(request: RequestBuilder, context: &str) -> Result<Response, ProviderError> {
    let response = request.send().await?;
    ensure_success(response, context).await
}

async fn ensure_success(response: Response, context: &str) -> Result<Response, ProviderError> {
    log::debug!("{context} HTTP status: {}", response.status());
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await?;
    let data = if text.trim().is_empty() {
        None
    } else {
        Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    };
    Err(ProviderError::Http {
        message: format!("Request failed with status code {}", status.as_u16()),
        status: status.as_u16(),
        status_text: status.canonical_reason().map(str::to_string),
        data,
    })
}

pub(crate) async fn read_json(response: Response) -> Result<Value, ProviderError> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Keeps bodies that are not declared as JSON as text so callers can tell
/// an HTML login page apart from a malformed payload.
pub(crate) async fn read_body(response: Response) -> Result<ResponseBody, ProviderError> {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("json"));
    let text = response.text().await?;
    if is_json {
        if let Ok(value) = serde_json::from_str(&text) {
            return Ok(ResponseBody::Json(value));
        }
    }
    Ok(ResponseBody::Text(text))
}
