use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<SpaceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<PageVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<PageBody>,
    #[serde(rename = "_links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
}

impl Page {
    pub fn version_number(&self) -> Option<u64> {
        self.version.as_ref().map(|version| version.number)
    }

    pub fn storage_value(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|body| body.storage.as_ref())
            .map(|storage| storage.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceRef {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageVersion {
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageBody {
    pub value: String,
    #[serde(default = "storage_representation")]
    pub representation: String,
}

fn storage_representation() -> String {
    "storage".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageResults {
    #[serde(default)]
    pub results: Vec<Page>,
    #[serde(default)]
    pub size: u64,
}

/// New page in Confluence storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePageInput {
    pub space_key: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl CreatePageInput {
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "type": "page",
            "title": self.title,
            "space": { "key": self.space_key },
            "body": {
                "storage": { "value": self.body, "representation": "storage" }
            }
        });
        if let Some(parent) = &self.parent_id {
            payload["ancestors"] = json!([{ "id": parent }]);
        }
        payload
    }
}

/// Replacement content for an existing page.
///
/// Without an explicit `version` the client reads the current page and
/// bumps its version number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePageInput {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl UpdatePageInput {
    pub fn to_payload(&self, version: u64) -> Value {
        json!({
            "id": self.id,
            "type": "page",
            "title": self.title,
            "version": { "number": version },
            "body": {
                "storage": { "value": self.body, "representation": "storage" }
            }
        })
    }
}
