#[path = "client/guard.rs"]
mod guard;

#[path = "client/jira.rs"]
mod jira;

#[path = "client/confluence.rs"]
mod confluence;

pub use confluence::ResilientConfluenceClient;
pub use jira::{parse_search_body, ResilientJiraClient};
