#[path = "models/jira.rs"]
mod jira;

#[path = "models/confluence.rs"]
mod confluence;

pub use confluence::{
    CreatePageInput, Page, PageBody, PageResults, PageVersion, SpaceRef, StorageBody,
    UpdatePageInput,
};
pub use jira::{
    CreatedIssue, FieldSchema, Issue, JiraField, SearchResults, Transition, TransitionList,
    TransitionTarget,
};
