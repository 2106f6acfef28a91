use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Jira issue as returned by `GET /issue/{key}` and search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_url: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Issue {
    pub fn summary(&self) -> Option<&str> {
        self.fields.get("summary").and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<&str> {
        self.fields
            .get("status")
            .and_then(|status| status.get("name"))
            .and_then(Value::as_str)
    }

    pub fn field(&self, id: &str) -> Option<&Value> {
        self.fields.get(id).filter(|value| !value.is_null())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub start_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<TransitionTarget>,
}

impl Transition {
    /// Matches a raw transition id, or a transition or destination status
    /// name ignoring case.
    pub fn matches(&self, target: &str) -> bool {
        let target = target.trim();
        self.id == target
            || self.name.eq_ignore_ascii_case(target)
            || self
                .to
                .as_ref()
                .is_some_and(|to| to.name.eq_ignore_ascii_case(target))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionList {
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

/// Entry of the field catalog returned by `GET /field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraField {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<FieldSchema>,
}

impl JiraField {
    /// Jira's built-in "Epic Link" field takes the epic key as a plain string.
    pub fn is_epic_link_type(&self) -> bool {
        self.schema
            .as_ref()
            .and_then(|schema| schema.custom.as_deref())
            .is_some_and(|custom| custom.ends_with(":gh-epic-link"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
}
