use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{
    creation::IssueCreator,
    error::AppError,
    fields::{FieldCatalog, FieldService, LogicalField},
    models::CreatedIssue,
};

/// Typed input for a new issue, from CLI flags or a YAML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateIssueInput {
    pub project: String,
    #[serde(alias = "issueType", alias = "type")]
    pub issue_type: String,
    pub summary: String,
    pub description: Option<String>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
    pub priority: Option<String>,
    /// Atlassian account id.
    pub assignee: Option<String>,
    #[serde(alias = "acceptanceCriteria")]
    pub acceptance_criteria: Option<String>,
    /// Key of the epic the issue belongs to.
    pub epic: Option<String>,
    #[serde(alias = "storyPoints")]
    pub story_points: Option<f64>,
    /// Sprint id.
    pub sprint: Option<u64>,
    /// Raw field id → value pairs, applied last.
    #[serde(alias = "customFields")]
    pub custom_fields: Map<String, Value>,
}

impl CreateIssueInput {
    pub fn validate(&self) -> Result<(), AppError> {
        let missing: Vec<&str> = [
            ("project", &self.project),
            ("issue_type", &self.issue_type),
            ("summary", &self.summary),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(format!(
                "missing required issue fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Standard Jira fields only; logical and custom fields are added by
    /// the caller.
    pub fn base_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("project".into(), json!({ "key": self.project }));
        fields.insert("issuetype".into(), json!({ "name": self.issue_type }));
        fields.insert("summary".into(), json!(self.summary));
        insert_standard(
            &mut fields,
            self.description.as_deref(),
            Some(&self.labels).filter(|l| !l.is_empty()),
            Some(&self.components).filter(|c| !c.is_empty()),
            self.priority.as_deref(),
            self.assignee.as_deref(),
        );
        fields
    }
}

/// Partial update; only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateIssueInput {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub labels: Option<Vec<String>>,
    pub components: Option<Vec<String>>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    #[serde(alias = "acceptanceCriteria")]
    pub acceptance_criteria: Option<String>,
    pub epic: Option<String>,
    #[serde(alias = "storyPoints")]
    pub story_points: Option<f64>,
    pub sprint: Option<u64>,
    #[serde(alias = "customFields")]
    pub custom_fields: Map<String, Value>,
}

impl UpdateIssueInput {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.description.is_none()
            && self.labels.is_none()
            && self.components.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.acceptance_criteria.is_none()
            && self.epic.is_none()
            && self.story_points.is_none()
            && self.sprint.is_none()
            && self.custom_fields.is_empty()
    }
}

fn insert_standard(
    fields: &mut Map<String, Value>,
    description: Option<&str>,
    labels: Option<&Vec<String>>,
    components: Option<&Vec<String>>,
    priority: Option<&str>,
    assignee: Option<&str>,
) {
    if let Some(description) = description {
        fields.insert("description".into(), json!(description));
    }
    if let Some(labels) = labels {
        fields.insert("labels".into(), json!(labels));
    }
    if let Some(components) = components {
        let components: Vec<Value> = components.iter().map(|c| json!({ "name": c })).collect();
        fields.insert("components".into(), Value::Array(components));
    }
    if let Some(priority) = priority {
        fields.insert("priority".into(), json!({ "name": priority }));
    }
    if let Some(assignee) = assignee {
        fields.insert("assignee".into(), json!({ "accountId": assignee }));
    }
}

/// Values for the logical fields, resolved against the site before sending.
struct LogicalValues<'a> {
    acceptance: Option<&'a str>,
    epic: Option<&'a str>,
    story_points: Option<f64>,
    sprint: Option<u64>,
}

/// Builds issue payloads, mapping logical fields onto the site's custom fields.
pub struct IssueService<C> {
    fields: Arc<FieldService<C>>,
}

impl<C: FieldCatalog> IssueService<C> {
    pub fn new(fields: Arc<FieldService<C>>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &FieldService<C> {
        &self.fields
    }

    pub async fn build_create_payload(&self, input: &CreateIssueInput) -> Result<Value, AppError> {
        input.validate()?;
        let mut fields = input.base_fields();
        self.resolve_into(
            &mut fields,
            LogicalValues {
                acceptance: input.acceptance_criteria.as_deref(),
                epic: input.epic.as_deref(),
                story_points: input.story_points,
                sprint: input.sprint,
            },
        )
        .await;
        merge(&mut fields, &input.custom_fields);
        Ok(json!({ "fields": fields }))
    }

    pub async fn build_update_payload(&self, input: &UpdateIssueInput) -> Result<Value, AppError> {
        if input.is_empty() {
            return Err(AppError::validation("no fields to update"));
        }
        let mut fields = Map::new();
        if let Some(summary) = &input.summary {
            fields.insert("summary".into(), json!(summary));
        }
        insert_standard(
            &mut fields,
            input.description.as_deref(),
            input.labels.as_ref(),
            input.components.as_ref(),
            input.priority.as_deref(),
            input.assignee.as_deref(),
        );
        self.resolve_into(
            &mut fields,
            LogicalValues {
                acceptance: input.acceptance_criteria.as_deref(),
                epic: input.epic.as_deref(),
                story_points: input.story_points,
                sprint: input.sprint,
            },
        )
        .await;
        merge(&mut fields, &input.custom_fields);
        Ok(json!({ "fields": fields }))
    }

    pub async fn create_issue<W>(
        &self,
        writer: &W,
        input: &CreateIssueInput,
    ) -> Result<CreatedIssue, AppError>
    where
        W: IssueCreator + ?Sized,
    {
        let payload = self.build_create_payload(input).await?;
        let created = writer.create_issue(&payload).await?;
        log::info!("created {}", created.key);
        Ok(created)
    }

    async fn resolve_into(&self, fields: &mut Map<String, Value>, values: LogicalValues<'_>) {
        if let Some(text) = values.acceptance {
            self.insert_resolved(fields, LogicalField::Acceptance, json!(text))
                .await;
        }
        if let Some(points) = values.story_points {
            self.insert_resolved(fields, LogicalField::StoryPoints, json!(points))
                .await;
        }
        if let Some(sprint) = values.sprint {
            self.insert_resolved(fields, LogicalField::Sprint, json!(sprint))
                .await;
        }
        if let Some(epic) = values.epic {
            let (id, value) = self.epic_value(epic).await;
            fields.insert(id, value);
        }
    }

    async fn insert_resolved(&self, fields: &mut Map<String, Value>, field: LogicalField, value: Value) {
        match self.fields.resolve_field_id(field).await {
            Some(id) => {
                fields.insert(id, value);
            }
            None => log::warn!("no Jira field found for '{field}', leaving it out"),
        }
    }

    /// Field id and value for an epic link.
    ///
    /// Classic "Epic Link" fields and configured string fields take the bare
    /// key; everything else, including the `parent` fallback, takes `{key}`.
    async fn epic_value(&self, epic: &str) -> (String, Value) {
        let Some(id) = self.fields.resolve_field_id(LogicalField::Epic).await else {
            return ("parent".to_string(), json!({ "key": epic }));
        };
        let as_text = self.fields.is_epic_string_field(&id)
            || (id != "parent"
                && self
                    .fields
                    .field_by_id(&id)
                    .await
                    .is_some_and(|field| field.is_epic_link_type()));
        let value = if as_text {
            json!(epic)
        } else {
            json!({ "key": epic })
        };
        (id, value)
    }
}

pub(crate) fn merge(fields: &mut Map<String, Value>, custom: &Map<String, Value>) {
    for (id, value) in custom {
        fields.insert(id.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::ErrorCode,
        fields::{FieldConfig, FieldMapping},
        models::{FieldSchema, JiraField},
    };

    struct StaticCatalog(Vec<JiraField>);

    #[async_trait]
    impl FieldCatalog for StaticCatalog {
        async fn list_fields(&self) -> Result<Vec<JiraField>, AppError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingCreator {
        payloads: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl IssueCreator for RecordingCreator {
        async fn create_issue(&self, payload: &Value) -> Result<CreatedIssue, AppError> {
            self.payloads.lock().unwrap().push(payload.clone());
            Ok(CreatedIssue {
                id: "10001".to_string(),
                key: "PROJ-7".to_string(),
                self_url: None,
            })
        }
    }

    fn field(id: &str, name: &str, custom_schema: Option<&str>) -> JiraField {
        JiraField {
            id: id.to_string(),
            name: name.to_string(),
            custom: true,
            schema: custom_schema.map(|custom| FieldSchema {
                custom: Some(custom.to_string()),
                ..FieldSchema::default()
            }),
        }
    }

    fn issues(catalog: Vec<JiraField>, config: FieldConfig) -> IssueService<StaticCatalog> {
        IssueService::new(Arc::new(FieldService::new(StaticCatalog(catalog), config)))
    }

    fn story() -> CreateIssueInput {
        CreateIssueInput {
            project: "PROJ".to_string(),
            issue_type: "Story".to_string(),
            summary: "Checkout flow".to_string(),
            ..CreateIssueInput::default()
        }
    }

    #[tokio::test]
    async fn create_payload_maps_standard_and_logical_fields() {
        let service = issues(
            vec![
                field("customfield_10100", "Acceptance Criteria", None),
                field("customfield_10016", "Story Points", None),
                field("customfield_10020", "Sprint", None),
            ],
            FieldConfig::default(),
        );
        let input = CreateIssueInput {
            description: Some("As a buyer".to_string()),
            labels: vec!["web".to_string()],
            components: vec!["Cart".to_string()],
            priority: Some("High".to_string()),
            assignee: Some("5b10ac8d82e05b22cc7d4ef5".to_string()),
            acceptance_criteria: Some("Given a cart".to_string()),
            story_points: Some(3.0),
            sprint: Some(42),
            ..story()
        };

        let payload = service.build_create_payload(&input).await.unwrap();
        let fields = &payload["fields"];

        assert_eq!(fields["project"]["key"], "PROJ");
        assert_eq!(fields["issuetype"]["name"], "Story");
        assert_eq!(fields["components"][0]["name"], "Cart");
        assert_eq!(fields["priority"]["name"], "High");
        assert_eq!(fields["assignee"]["accountId"], "5b10ac8d82e05b22cc7d4ef5");
        assert_eq!(fields["customfield_10100"], "Given a cart");
        assert_eq!(fields["customfield_10016"], 3.0);
        assert_eq!(fields["customfield_10020"], 42);
    }

    #[tokio::test]
    async fn custom_fields_take_precedence() {
        let service = issues(
            vec![field("customfield_10100", "Acceptance Criteria", None)],
            FieldConfig::default(),
        );
        let mut input = CreateIssueInput {
            acceptance_criteria: Some("resolved".to_string()),
            ..story()
        };
        input
            .custom_fields
            .insert("customfield_10100".to_string(), json!("explicit"));
        input
            .custom_fields
            .insert("summary".to_string(), json!("override"));

        let payload = service.build_create_payload(&input).await.unwrap();

        assert_eq!(payload["fields"]["customfield_10100"], "explicit");
        assert_eq!(payload["fields"]["summary"], "override");
    }

    #[tokio::test]
    async fn epic_link_type_takes_bare_key() {
        let service = issues(
            vec![field(
                "customfield_10014",
                "Epic Link",
                Some("com.pyxis.greenhopper.jira:gh-epic-link"),
            )],
            FieldConfig::default(),
        );
        let input = CreateIssueInput {
            epic: Some("PROJ-1".to_string()),
            ..story()
        };

        let payload = service.build_create_payload(&input).await.unwrap();

        assert_eq!(payload["fields"]["customfield_10014"], "PROJ-1");
    }

    #[tokio::test]
    async fn epic_formats_follow_config_and_fallback() {
        let configured = issues(
            vec![],
            FieldConfig {
                field_mapping: FieldMapping {
                    epic: Some("customfield_10008".to_string()),
                    ..FieldMapping::default()
                },
                epic_string_fields: vec!["customfield_10008".to_string()],
                ..FieldConfig::default()
            },
        );
        let unresolved = issues(vec![], FieldConfig::default());
        let input = CreateIssueInput {
            epic: Some("PROJ-1".to_string()),
            ..story()
        };

        let text = configured.build_create_payload(&input).await.unwrap();
        let parent = unresolved.build_create_payload(&input).await.unwrap();

        assert_eq!(text["fields"]["customfield_10008"], "PROJ-1");
        assert_eq!(parent["fields"]["parent"], json!({ "key": "PROJ-1" }));
    }

    #[tokio::test]
    async fn unresolved_fields_are_left_out() {
        let service = issues(vec![], FieldConfig::default());
        let input = CreateIssueInput {
            acceptance_criteria: Some("Given".to_string()),
            story_points: Some(5.0),
            ..story()
        };

        let payload = service.build_create_payload(&input).await.unwrap();

        assert_eq!(payload["fields"].as_object().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn create_requires_project_type_and_summary() {
        let service = issues(vec![], FieldConfig::default());
        let input = CreateIssueInput {
            summary: " ".to_string(),
            ..CreateIssueInput::default()
        };
        let creator = RecordingCreator::default();

        let err = service.create_issue(&creator, &input).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(err.message.contains("project, issue_type, summary"));
        assert!(creator.payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_sends_built_payload() {
        let service = issues(vec![], FieldConfig::default());
        let creator = RecordingCreator::default();

        let created = service.create_issue(&creator, &story()).await.unwrap();

        assert_eq!(created.key, "PROJ-7");
        assert_eq!(
            creator.payloads.lock().unwrap()[0]["fields"]["summary"],
            "Checkout flow"
        );
    }

    #[tokio::test]
    async fn update_payload_only_carries_set_fields() {
        let service = issues(
            vec![field("customfield_10016", "Story Points", None)],
            FieldConfig::default(),
        );
        let input = UpdateIssueInput {
            labels: Some(vec![]),
            story_points: Some(8.0),
            ..UpdateIssueInput::default()
        };

        let payload = service.build_update_payload(&input).await.unwrap();

        assert_eq!(
            payload,
            json!({ "fields": { "labels": [], "customfield_10016": 8.0 } })
        );
        let empty = service
            .build_update_payload(&UpdateIssueInput::default())
            .await
            .unwrap_err();
        assert_eq!(empty.code, ErrorCode::ValidationError);
    }

    #[test]
    fn input_reads_camel_case_yaml_keys() {
        let input: CreateIssueInput = serde_json::from_value(json!({
            "project": "PROJ",
            "issueType": "Bug",
            "summary": "Crash",
            "storyPoints": 2,
            "customFields": { "customfield_1": "x" }
        }))
        .unwrap();

        assert_eq!(input.issue_type, "Bug");
        assert_eq!(input.story_points, Some(2.0));
        assert!(input.validate().is_ok());
    }
}
