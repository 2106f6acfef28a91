//! Resilient Jira and Confluence REST client.
//!
//! Every outbound call goes through the same layered core: a per-service
//! circuit breaker ([`resilience::CircuitRegistry`]) guarding an
//! exponential-backoff retrier ([`resilience::with_retry`]), with failures
//! normalized into the closed [`error::AppError`] taxonomy at the client
//! boundary.
//!
//! On top of the core sit the adaptive custom-field resolution
//! ([`fields::FieldService`]), the issue payload builder
//! ([`issue::IssueService`]) and the legacy create path that degrades the
//! payload when Jira rejects a custom field ([`creation`]).
//!
//! # Example
//!
//! ```no_run
//! use atl::builder::ClientBuilder;
//!
//! # async fn run() -> Result<(), atl::error::AppError> {
//! let jira = ClientBuilder::new()
//!     .base_url("https://example.atlassian.net")
//!     .email("me@example.com")
//!     .api_token("token")
//!     .resilient_attempts(4)
//!     .build_jira()?;
//!
//! let issue = jira.get_issue("PROJ-42", &[]).await?;
//! println!("{}: {}", issue.key, issue.summary().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod builder;
pub mod client;
pub mod creation;
pub mod error;
pub mod fields;
pub mod issue;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod resilience;

pub use client::{ResilientConfluenceClient, ResilientJiraClient};
pub use error::{AppError, ErrorCode, ProviderError};
pub use provider::{ConfluenceApi, JiraApi, ResponseBody};
pub use resilience::{CircuitRegistry, ResilienceConfig};
