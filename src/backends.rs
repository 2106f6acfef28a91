//! reqwest implementations of [`crate::JiraApi`] and [`crate::ConfluenceApi`].

mod http;

pub mod confluence;
pub mod jira;

pub use confluence::ConfluenceHttp;
pub use http::HttpConfig;
pub use jira::JiraHttp;
