use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{error::AppError, models::JiraField};

/// Source of the Jira field catalog.
#[async_trait]
pub trait FieldCatalog: Send + Sync {
    async fn list_fields(&self) -> Result<Vec<JiraField>, AppError>;
}

#[async_trait]
impl<T: FieldCatalog + ?Sized> FieldCatalog for Arc<T> {
    async fn list_fields(&self) -> Result<Vec<JiraField>, AppError> {
        (**self).list_fields().await
    }
}

/// Instance-independent name for a custom field whose id varies per site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    Acceptance,
    Epic,
    StoryPoints,
    Sprint,
}

impl LogicalField {
    pub const ALL: [LogicalField; 4] = [
        LogicalField::Acceptance,
        LogicalField::Epic,
        LogicalField::StoryPoints,
        LogicalField::Sprint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalField::Acceptance => "acceptance",
            LogicalField::Epic => "epic",
            LogicalField::StoryPoints => "storyPoints",
            LogicalField::Sprint => "sprint",
        }
    }

    pub fn default_candidates(&self) -> &'static [&'static str] {
        match self {
            LogicalField::Acceptance => &["Acceptance Criteria", "Acceptance criteria", "AC"],
            LogicalField::Epic => &["Epic Link", "Epic", "Parent Link"],
            LogicalField::StoryPoints => &["Story Points", "Story point estimate"],
            LogicalField::Sprint => &["Sprint"],
        }
    }

    /// Last-resort pattern matched against field names.
    pub fn pattern(&self) -> &'static Regex {
        static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            [
                r"(?i)acceptance",
                r"(?i)epic\s*link",
                r"(?i)story\s*points?",
                r"(?i)sprint",
            ]
            .map(|pattern| Regex::new(pattern).expect("field pattern is valid"))
        });
        &patterns[*self as usize]
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "acceptance" => Ok(LogicalField::Acceptance),
            "epic" => Ok(LogicalField::Epic),
            "storyPoints" | "story_points" => Ok(LogicalField::StoryPoints),
            "sprint" => Ok(LogicalField::Sprint),
            other => Err(AppError::validation(format!(
                "unknown logical field '{other}'; expected one of acceptance, epic, storyPoints, sprint"
            ))),
        }
    }
}

/// Explicit logical field → field id overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub acceptance: Option<String>,
    pub epic: Option<String>,
    #[serde(alias = "storyPoints")]
    pub story_points: Option<String>,
    pub sprint: Option<String>,
}

impl FieldMapping {
    pub fn get(&self, field: LogicalField) -> Option<&str> {
        let id = match field {
            LogicalField::Acceptance => &self.acceptance,
            LogicalField::Epic => &self.epic,
            LogicalField::StoryPoints => &self.story_points,
            LogicalField::Sprint => &self.sprint,
        };
        id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}

/// Per-site field configuration, usually the `[fields]` table of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    #[serde(alias = "fieldMapping")]
    pub field_mapping: FieldMapping,
    #[serde(alias = "acceptanceFieldCandidates")]
    pub acceptance_field_candidates: Vec<String>,
    #[serde(alias = "epicFieldCandidates")]
    pub epic_field_candidates: Vec<String>,
    /// Epic fields that take the epic key as a plain string.
    #[serde(alias = "epicStringFields")]
    pub epic_string_fields: Vec<String>,
}

impl FieldConfig {
    /// Candidate names for `field`, configured ones replacing the defaults.
    pub fn candidates(&self, field: LogicalField) -> Vec<&str> {
        let configured = match field {
            LogicalField::Acceptance => self.acceptance_field_candidates.as_slice(),
            LogicalField::Epic => self.epic_field_candidates.as_slice(),
            LogicalField::StoryPoints | LogicalField::Sprint => &[],
        };
        if configured.is_empty() {
            field.default_candidates().to_vec()
        } else {
            configured.iter().map(String::as_str).collect()
        }
    }
}

/// Resolves logical fields to the custom field ids of one Jira site.
///
/// The catalog is fetched lazily, at most once until [`FieldService::clear_cache`],
/// and concurrent resolutions wait for the same fetch.
pub struct FieldService<C> {
    catalog: C,
    config: FieldConfig,
    cache: Mutex<Option<Arc<Vec<JiraField>>>>,
}

impl<C: FieldCatalog> FieldService<C> {
    pub fn new(catalog: C, config: FieldConfig) -> Self {
        Self {
            catalog,
            config,
            cache: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// Cached field catalog. Discovery is best effort: a failed fetch is
    /// logged and cached as an empty catalog.
    pub async fn fields(&self) -> Arc<Vec<JiraField>> {
        let mut cache = self.cache.lock().await;
        if let Some(fields) = cache.as_ref() {
            return Arc::clone(fields);
        }
        let fields = match self.catalog.list_fields().await {
            Ok(fields) => {
                log::debug!("loaded {} Jira fields", fields.len());
                fields
            }
            Err(err) => {
                log::warn!("could not load Jira field catalog, continuing without it: {err}");
                Vec::new()
            }
        };
        let fields = Arc::new(fields);
        *cache = Some(Arc::clone(&fields));
        fields
    }

    pub async fn clear_cache(&self) {
        *self.cache.lock().await = None;
    }

    pub async fn resolve_field_id(&self, field: LogicalField) -> Option<String> {
        if let Some(id) = self.config.field_mapping.get(field) {
            return Some(id.to_string());
        }

        let catalog = self.fields().await;
        for candidate in self.config.candidates(field) {
            let found = catalog.iter().find(|f| {
                f.name.eq_ignore_ascii_case(candidate) || f.id.eq_ignore_ascii_case(candidate)
            });
            if let Some(found) = found {
                return Some(found.id.clone());
            }
        }

        let pattern = field.pattern();
        let found = catalog.iter().find(|f| pattern.is_match(&f.name));
        if found.is_none() {
            log::debug!("no Jira field found for '{field}'");
        }
        found.map(|f| f.id.clone())
    }

    pub async fn assert_field_id(&self, field: LogicalField) -> Result<String, AppError> {
        self.resolve_field_id(field).await.ok_or_else(|| {
            AppError::validation(format!(
                "could not resolve a Jira field for '{field}'; set fields.field_mapping.{} in the config",
                match field {
                    LogicalField::StoryPoints => "story_points",
                    other => other.as_str(),
                }
            ))
        })
    }

    pub async fn field_by_id(&self, id: &str) -> Option<JiraField> {
        self.fields().await.iter().find(|f| f.id == id).cloned()
    }

    pub fn is_epic_string_field(&self, id: &str) -> bool {
        self.config.epic_string_fields.iter().any(|f| f == id)
    }
}

#[cfg(test)]
mod tests;
