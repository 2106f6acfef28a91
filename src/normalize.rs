//! Classification of raw provider failures into [`AppError`].
//!
//! Raw errors come in a handful of shapes: an HTTP error response, a
//! transport failure carrying a socket-level code, or something unrecognized.
//! [`ProviderError::decode`] turns a loosely structured error object into one
//! of those shapes; the `normalize_*` functions then map each shape onto the
//! closed [`ErrorCode`] taxonomy and pull a readable message out of the
//! provider payload.

use serde_json::{Map, Value};

use crate::error::{AppError, ErrorCode, ProviderError};

/// Transport error codes that indicate a transient network failure.
pub const NETWORK_ERROR_CODES: [&str; 5] = [
    "ECONNRESET",
    "ECONNREFUSED",
    "ETIMEDOUT",
    "ENOTFOUND",
    "EAI_AGAIN",
];

const NETWORK_ERROR_MESSAGES: [&str; 3] =
    ["network error", "socket hang up", "connection refused"];

/// HTTP statuses worth another attempt.
pub const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

pub const JIRA_RETRYABLE_STATUSES: [u16; 4] = RETRYABLE_STATUSES;

pub const CONFLUENCE_RETRYABLE_STATUSES: [u16; 4] = RETRYABLE_STATUSES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Jira,
    Confluence,
}

impl Provider {
    fn label(self) -> &'static str {
        match self {
            Provider::Jira => "Jira",
            Provider::Confluence => "Confluence",
        }
    }

    fn code(self) -> ErrorCode {
        match self {
            Provider::Jira => ErrorCode::JiraApiError,
            Provider::Confluence => ErrorCode::ConfluenceApiError,
        }
    }

    fn retryable_statuses(self) -> &'static [u16] {
        match self {
            Provider::Jira => &JIRA_RETRYABLE_STATUSES,
            Provider::Confluence => &CONFLUENCE_RETRYABLE_STATUSES,
        }
    }
}

impl ProviderError {
    /// Decodes a loosely structured error object.
    ///
    /// `response.status` wins over a top-level `status`; an object with a
    /// `code` but no status is a transport failure; everything else is
    /// generic.
    pub fn decode(raw: &Value) -> Self {
        if let Some(text) = raw.as_str() {
            return ProviderError::Generic(text.to_string());
        }
        let message = raw
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let response = raw.get("response").filter(|r| r.is_object());
        let status = response
            .and_then(|r| r.get("status"))
            .and_then(Value::as_u64)
            .or_else(|| raw.get("status").and_then(Value::as_u64))
            .and_then(|status| u16::try_from(status).ok());

        if let Some(status) = status {
            return ProviderError::Http {
                message,
                status,
                status_text: response
                    .and_then(|r| r.get("statusText"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                data: response.and_then(|r| r.get("data")).cloned(),
            };
        }
        if let Some(code) = raw.get("code").and_then(Value::as_str) {
            return ProviderError::Network {
                code: Some(code.to_string()),
                message,
            };
        }
        if message.is_empty() {
            ProviderError::Generic(raw.to_string())
        } else {
            ProviderError::Generic(message)
        }
    }
}

fn is_network_code(code: &str) -> bool {
    NETWORK_ERROR_CODES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(code))
}

fn is_network_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    NETWORK_ERROR_MESSAGES
        .iter()
        .any(|fragment| lower.contains(fragment))
}

/// Retry policy shared by both resilient clients.
pub fn is_retryable_error(err: &ProviderError) -> bool {
    match err {
        ProviderError::Network { code, message } => {
            code.as_deref().is_some_and(is_network_code) || is_network_message(message)
        }
        ProviderError::Http {
            status, message, ..
        } => RETRYABLE_STATUSES.contains(status) || is_network_message(message),
        ProviderError::Generic(message) => is_network_message(message),
        ProviderError::App(app) => app.is_retryable(),
    }
}

/// Whether a failure says something about the health of the service itself.
///
/// Client errors such as a 404 or a rejected field leave the circuit alone.
pub fn is_service_failure(err: &ProviderError) -> bool {
    match err {
        ProviderError::Network { .. } => true,
        ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
        ProviderError::Generic(message) => is_network_message(message),
        ProviderError::App(app) => {
            app.code == ErrorCode::NetworkError
                || app.status_code.is_some_and(|s| s == 429 || s >= 500)
        }
    }
}

pub fn is_retryable_jira_error(err: &AppError) -> bool {
    is_retryable_app_error(err, Provider::Jira)
}

pub fn is_retryable_confluence_error(err: &AppError) -> bool {
    is_retryable_app_error(err, Provider::Confluence)
}

fn is_retryable_app_error(err: &AppError, provider: Provider) -> bool {
    if err.code == provider.code() {
        return err
            .status_code
            .is_some_and(|status| provider.retryable_statuses().contains(&status));
    }
    err.is_retryable()
}

pub fn normalize_jira_error(err: ProviderError) -> AppError {
    normalize(err, Provider::Jira)
}

pub fn normalize_confluence_error(err: ProviderError) -> AppError {
    normalize(err, Provider::Confluence)
}

fn normalize(err: ProviderError, provider: Provider) -> AppError {
    match err {
        ProviderError::App(app) => *app,
        ProviderError::Http {
            ref message,
            status,
            ref data,
            ..
        } => {
            let (extracted, context) = match provider {
                Provider::Jira => jira_details(data.as_ref()),
                Provider::Confluence => (confluence_message(data.as_ref()), None),
            };
            let text = extracted
                .or_else(|| (!message.is_empty()).then(|| message.clone()))
                .unwrap_or_else(|| {
                    format!("{} request failed with status {status}", provider.label())
                });
            let mut app = AppError::new(provider.code(), text).with_status(status);
            if let Some(context) = context {
                app = app.with_context(context);
            }
            app.with_cause(err)
        }
        ProviderError::Network { .. } => {
            AppError::network(format!("{} request failed: {err}", provider.label()))
                .with_cause(err)
        }
        ProviderError::Generic(_) => AppError::unknown(err.to_string()).with_cause(err),
    }
}

/// Joins `errorMessages[]` and `errors{}` from a Jira error body.
fn jira_details(data: Option<&Value>) -> (Option<String>, Option<Value>) {
    let Some(data) = data.filter(|d| d.is_object()) else {
        return (None, None);
    };
    let mut parts: Vec<String> = data
        .get("errorMessages")
        .and_then(Value::as_array)
        .map(|messages| {
            messages
                .iter()
                .filter_map(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let errors: Option<&Map<String, Value>> = data
        .get("errors")
        .and_then(Value::as_object)
        .filter(|errors| !errors.is_empty());
    if let Some(errors) = errors {
        parts.extend(errors.iter().map(|(field, message)| match message.as_str() {
            Some(text) => format!("{field}: {text}"),
            None => format!("{field}: {message}"),
        }));
    }

    let context = errors.map(|errors| serde_json::json!({ "errors": errors }));
    if parts.is_empty() {
        (None, context)
    } else {
        (Some(parts.join("; ")), context)
    }
}

fn confluence_message(data: Option<&Value>) -> Option<String> {
    let data = data?;
    ["message", "reason"]
        .iter()
        .find_map(|key| {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests;
