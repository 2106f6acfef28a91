use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::normalize::RETRYABLE_STATUSES;

/// Boxed error kept as the diagnostic cause of an [`AppError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Closed set of failure categories callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Missing or malformed configuration
    ConfigError,
    /// Malformed user input
    ValidationError,
    /// Jira rejected the request
    JiraApiError,
    /// Confluence rejected the request
    ConfluenceApiError,
    /// Transport failure before a response was received
    NetworkError,
    /// The service is short-circuited by local health tracking
    CircuitBreakerOpen,
    /// Failure of an unrecognized shape
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::JiraApiError => "JIRA_API_ERROR",
            Self::ConfluenceApiError => "CONFLUENCE_API_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::CircuitBreakerOpen => "CIRCUIT_BREAKER_OPEN",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized failure surfaced by every public operation of the crate.
#[derive(Debug)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub status_code: Option<u16>,
    pub context: Option<Value>,
    cause: Option<BoxError>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: None,
            context: None,
            cause: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn jira_api(message: impl Into<String>, status: Option<u16>) -> Self {
        let mut err = Self::new(ErrorCode::JiraApiError, message);
        err.status_code = status;
        err
    }

    pub fn confluence_api(message: impl Into<String>, status: Option<u16>) -> Self {
        let mut err = Self::new(ErrorCode::ConfluenceApiError, message);
        err.status_code = status;
        err
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    pub fn circuit_open(service: &str, retry_after_ms: u64) -> Self {
        Self::new(
            ErrorCode::CircuitBreakerOpen,
            format!(
                "{service} is temporarily unavailable (circuit open); retry in {retry_after_ms}ms"
            ),
        )
        .with_context(serde_json::json!({
            "service": service,
            "retryAfterMs": retry_after_ms,
        }))
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnknownError, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Original failure this error was produced from, if any.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Whether repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self.code {
            ErrorCode::NetworkError | ErrorCode::CircuitBreakerOpen => true,
            ErrorCode::JiraApiError | ErrorCode::ConfluenceApiError => self
                .status_code
                .is_some_and(|status| RETRYABLE_STATUSES.contains(&status)),
            ErrorCode::ConfigError | ErrorCode::ValidationError | ErrorCode::UnknownError => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(status) => write!(f, "{} (status {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Raw failure of a provider call, decoded into one of the known shapes.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The server answered with a non-success status
    #[error("{message}")]
    Http {
        message: String,
        status: u16,
        status_text: Option<String>,
        data: Option<Value>,
    },
    /// The request never produced a response
    #[error("{message}")]
    Network {
        code: Option<String>,
        message: String,
    },
    /// Anything else
    #[error("{0}")]
    Generic(String),
    /// A failure that was already normalized
    #[error(transparent)]
    App(Box<AppError>),
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::App(app) => app.status_code,
            Self::Network { .. } | Self::Generic(_) => None,
        }
    }
}

impl From<AppError> for ProviderError {
    fn from(err: AppError) -> Self {
        ProviderError::App(Box::new(err))
    }
}

/// Converts reqwest transport errors into provider errors
impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ProviderError::Http {
                message: err.to_string(),
                status: status.as_u16(),
                status_text: status.canonical_reason().map(str::to_string),
                data: None,
            };
        }
        if err.is_decode() || err.is_builder() {
            return ProviderError::Generic(err.to_string());
        }
        let code = if err.is_timeout() {
            Some("ETIMEDOUT".to_string())
        } else if err.is_connect() {
            Some("ECONNREFUSED".to_string())
        } else {
            None
        };
        ProviderError::Network {
            code,
            message: format!("network error: {err}"),
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Generic(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::CircuitBreakerOpen).unwrap();
        assert_eq!(json, "\"CIRCUIT_BREAKER_OPEN\"");
        assert_eq!(ErrorCode::JiraApiError.to_string(), "JIRA_API_ERROR");
    }

    #[test]
    fn test_display_includes_status() {
        let err = AppError::jira_api("Issue does not exist", Some(404));
        assert_eq!(err.to_string(), "Issue does not exist (status 404)");
        assert_eq!(AppError::validation("bad").to_string(), "bad");
    }

    #[test]
    fn test_cause_is_exposed_as_source() {
        let raw = ProviderError::Generic("boom".to_string());
        let err = AppError::unknown("wrapped").with_cause(raw);
        assert_eq!(err.source().unwrap().to_string(), "boom");
        assert!(err.cause().is_some());
    }

    #[test]
    fn test_retryability_by_code_and_status() {
        assert!(AppError::network("reset").is_retryable());
        assert!(AppError::circuit_open("jira", 10).is_retryable());
        assert!(AppError::jira_api("busy", Some(503)).is_retryable());
        assert!(!AppError::jira_api("missing", Some(404)).is_retryable());
        assert!(!AppError::confluence_api("no status", None).is_retryable());
        assert!(!AppError::config("missing url").is_retryable());
    }

    #[test]
    fn test_serde_error_conversion() {
        let json_err = serde_json::from_str::<Value>("invalid json").unwrap_err();
        let err: ProviderError = json_err.into();
        assert!(matches!(err, ProviderError::Generic(msg) if msg.contains("line 1")));
    }
}
