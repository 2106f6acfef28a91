//! Legacy issue creation that adapts the payload to the site.
//!
//! Sites disagree on which custom field holds acceptance criteria and how the
//! epic link is typed. Instead of resolving them up front, this path sends a
//! best guess and reacts to Jira's field errors: it walks the candidate lists,
//! switches the epic value to a bare string when Jira asks for one, and
//! finally drops fields that no candidate accepts.

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::{Arc, OnceLock};

use crate::{error::AppError, issue::CreateIssueInput, models::CreatedIssue};

/// Anything that can submit an issue create payload.
#[async_trait]
pub trait IssueCreator: Send + Sync {
    async fn create_issue(&self, payload: &Value) -> Result<CreatedIssue, AppError>;
}

#[async_trait]
impl<T: IssueCreator + ?Sized> IssueCreator for Arc<T> {
    async fn create_issue(&self, payload: &Value) -> Result<CreatedIssue, AppError> {
        (**self).create_issue(payload).await
    }
}

pub const MAX_CREATE_ATTEMPTS: u32 = 3;

pub const DEFAULT_ACCEPTANCE_FIELDS: &[&str] =
    &["customfield_10100", "customfield_10035", "customfield_10600"];
pub const DEFAULT_EPIC_FIELDS: &[&str] = &["customfield_10014", "customfield_10008", "parent"];

pub const ACCEPTANCE_FIELD_ENV: &str = "JIRA_ACCEPTANCE_FIELD";
pub const ACCEPTANCE_FIELDS_ENV: &str = "JIRA_ACCEPTANCE_FIELDS";
pub const EPIC_FIELD_ENV: &str = "JIRA_EPIC_FIELD";
pub const EPIC_FIELDS_ENV: &str = "JIRA_EPIC_FIELDS";

/// Combines candidate sources in priority order, dropping blanks and
/// repeats while keeping the first occurrence.
pub fn compose_candidates(
    explicit: Option<&str>,
    single: Option<&str>,
    csv: Option<&str>,
    defaults: &[&str],
) -> Vec<String> {
    let listed = csv.into_iter().flat_map(|csv| csv.split(','));
    let mut out: Vec<String> = Vec::new();
    for candidate in explicit
        .into_iter()
        .chain(single)
        .chain(listed)
        .chain(defaults.iter().copied())
    {
        let candidate = candidate.trim();
        if !candidate.is_empty() && !out.iter().any(|c| c == candidate) {
            out.push(candidate.to_string());
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCandidates {
    pub acceptance: Vec<String>,
    pub epic: Vec<String>,
}

impl FieldCandidates {
    pub fn new(acceptance: Vec<String>, epic: Vec<String>) -> Self {
        Self { acceptance, epic }
    }

    /// Candidates from explicit overrides, then the process environment.
    pub fn from_env(acceptance: Option<&str>, epic: Option<&str>) -> Self {
        Self::from_lookup(acceptance, epic, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(acceptance: Option<&str>, epic: Option<&str>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            acceptance: compose_candidates(
                acceptance,
                lookup(ACCEPTANCE_FIELD_ENV).as_deref(),
                lookup(ACCEPTANCE_FIELDS_ENV).as_deref(),
                DEFAULT_ACCEPTANCE_FIELDS,
            ),
            epic: compose_candidates(
                epic,
                lookup(EPIC_FIELD_ENV).as_deref(),
                lookup(EPIC_FIELDS_ENV).as_deref(),
                DEFAULT_EPIC_FIELDS,
            ),
        }
    }
}

/// How the epic key is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EpicFormat {
    /// `{"key": "PROJ-1"}`
    Object,
    /// `"PROJ-1"`
    Text,
}

/// Issue to create through [`create_with_fallback`].
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyCreateRequest {
    pub fields: Map<String, Value>,
    pub acceptance_criteria: Option<String>,
    pub epic: Option<String>,
}

impl LegacyCreateRequest {
    /// Story points and sprint have no fallback candidates, so they are
    /// refused rather than dropped.
    pub fn from_input(input: &CreateIssueInput) -> Result<Self, AppError> {
        input.validate()?;
        let unsupported: Vec<&str> = [
            ("story_points", input.story_points.is_some()),
            ("sprint", input.sprint.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect();
        if !unsupported.is_empty() {
            return Err(AppError::validation(format!(
                "legacy create does not support: {}",
                unsupported.join(", ")
            )));
        }
        let mut fields = input.base_fields();
        crate::issue::merge(&mut fields, &input.custom_fields);
        Ok(Self {
            fields,
            acceptance_criteria: input.acceptance_criteria.clone(),
            epic: input.epic.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreationOutcome {
    pub issue: CreatedIssue,
    pub attempts: u32,
    pub acceptance_field: Option<String>,
    pub epic_field: Option<String>,
    pub epic_format: EpicFormat,
    /// Payload that was accepted.
    pub payload: Value,
}

struct Fallback<'a> {
    candidates: &'a FieldCandidates,
    acceptance: Option<usize>,
    epic: Option<usize>,
    epic_format: EpicFormat,
}

impl<'a> Fallback<'a> {
    fn new(request: &LegacyCreateRequest, candidates: &'a FieldCandidates) -> Self {
        let start = |value: &Option<String>, list: &[String]| {
            (value.is_some() && !list.is_empty()).then_some(0)
        };
        Self {
            candidates,
            acceptance: start(&request.acceptance_criteria, &candidates.acceptance),
            epic: start(&request.epic, &candidates.epic),
            epic_format: EpicFormat::Object,
        }
    }

    fn acceptance_field(&self) -> Option<&'a str> {
        self.acceptance
            .map(|i| self.candidates.acceptance[i].as_str())
    }

    fn epic_field(&self) -> Option<&'a str> {
        self.epic.map(|i| self.candidates.epic[i].as_str())
    }

    fn payload(&self, request: &LegacyCreateRequest) -> Value {
        let mut fields = request.fields.clone();
        if let (Some(field), Some(text)) = (self.acceptance_field(), &request.acceptance_criteria) {
            fields.insert(field.to_string(), json!(text));
        }
        if let (Some(field), Some(key)) = (self.epic_field(), &request.epic) {
            let value = match self.epic_format {
                EpicFormat::Object => json!({ "key": key }),
                EpicFormat::Text => json!(key),
            };
            fields.insert(field.to_string(), value);
        }
        json!({ "fields": fields })
    }

    /// Reacts to a rejected create. Returns false when the error is not
    /// about a field this protocol controls.
    fn adjust(&mut self, err: &AppError) -> bool {
        if let Some(field) = self.acceptance_field() {
            if field_rejection(err, field).is_some() {
                self.acceptance = next_index(self.acceptance, self.candidates.acceptance.len());
                match self.acceptance_field() {
                    Some(next) => log::warn!(
                        "Jira rejected acceptance criteria field {field}, retrying with {next}"
                    ),
                    None => log::warn!(
                        "Jira rejected every acceptance criteria field, creating the issue without it"
                    ),
                }
                return true;
            }
        }

        if let Some(field) = self.epic_field() {
            if let Some(reason) = field_rejection(err, field) {
                if self.epic_format == EpicFormat::Object && string_value_expected(&reason) {
                    self.epic_format = EpicFormat::Text;
                    log::warn!("epic field {field} expects a string, resending the epic key as text");
                    return true;
                }
                self.epic = next_index(self.epic, self.candidates.epic.len());
                self.epic_format = EpicFormat::Object;
                match self.epic_field() {
                    Some(next) => {
                        log::warn!("Jira rejected epic field {field}, retrying with {next}")
                    }
                    None => log::warn!(
                        "Jira rejected every epic field, creating the issue without an epic link"
                    ),
                }
                return true;
            }
        }

        false
    }
}

fn next_index(current: Option<usize>, len: usize) -> Option<usize> {
    current.map(|i| i + 1).filter(|i| *i < len)
}

/// Jira's complaint about `field`, taken from the `errors` map or, failing
/// that, from a message that names the field.
fn field_rejection(err: &AppError, field: &str) -> Option<String> {
    let from_map = err
        .context
        .as_ref()
        .and_then(|context| context.get("errors"))
        .and_then(|errors| errors.get(field))
        .map(|reason| match reason {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        });
    from_map.or_else(|| names_field(&err.message, field).then(|| err.message.clone()))
}

/// Whether `message` mentions `field` as a whole identifier.
fn names_field(message: &str, field: &str) -> bool {
    message
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|token| token == field)
}

fn string_value_expected(reason: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)string value expected").expect("pattern is valid"))
        .is_match(reason)
}

/// Creates an issue, adapting acceptance and epic fields to Jira's
/// rejections for up to [`MAX_CREATE_ATTEMPTS`] attempts.
///
/// An error that names neither the current acceptance nor the current epic
/// field is returned immediately.
pub async fn create_with_fallback<W>(
    writer: &W,
    request: &LegacyCreateRequest,
    candidates: &FieldCandidates,
) -> Result<CreationOutcome, AppError>
where
    W: IssueCreator + ?Sized,
{
    let mut state = Fallback::new(request, candidates);
    let mut attempt = 1;
    loop {
        let payload = state.payload(request);
        match writer.create_issue(&payload).await {
            Ok(issue) => {
                log::info!("created {} after {attempt} attempt(s)", issue.key);
                return Ok(CreationOutcome {
                    issue,
                    attempts: attempt,
                    acceptance_field: state.acceptance_field().map(str::to_string),
                    epic_field: state.epic_field().map(str::to_string),
                    epic_format: state.epic_format,
                    payload,
                });
            }
            Err(err) => {
                if attempt >= MAX_CREATE_ATTEMPTS || !state.adjust(&err) {
                    return Err(err);
                }
                attempt += 1;
            }
        }
    }
}
