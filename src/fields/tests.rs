use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::rstest;

use super::*;
use crate::error::ErrorCode;

struct CountingCatalog {
    fields: Vec<JiraField>,
    fail: bool,
    fetches: AtomicUsize,
}

impl CountingCatalog {
    fn with(fields: &[(&str, &str)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(id, name)| JiraField {
                    id: id.to_string(),
                    name: name.to_string(),
                    custom: id.starts_with("customfield_"),
                    schema: None,
                })
                .collect(),
            fail: false,
            fetches: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with(&[])
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FieldCatalog for CountingCatalog {
    async fn list_fields(&self) -> Result<Vec<JiraField>, AppError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::network("connect ECONNREFUSED"));
        }
        Ok(self.fields.clone())
    }
}

fn service(catalog: CountingCatalog, config: FieldConfig) -> FieldService<Arc<CountingCatalog>> {
    FieldService::new(Arc::new(catalog), config)
}

#[tokio::test]
async fn configured_mapping_wins_without_fetching() {
    let config = FieldConfig {
        field_mapping: FieldMapping {
            acceptance: Some("customfield_20000".to_string()),
            ..FieldMapping::default()
        },
        ..FieldConfig::default()
    };
    let catalog = Arc::new(CountingCatalog::with(&[(
        "customfield_10100",
        "Acceptance Criteria",
    )]));
    let fields = FieldService::new(Arc::clone(&catalog), config);

    let id = fields.resolve_field_id(LogicalField::Acceptance).await;

    assert_eq!(id.as_deref(), Some("customfield_20000"));
    assert_eq!(catalog.fetches(), 0);
}

#[tokio::test]
async fn exact_name_match_beats_pattern() {
    let fields = service(
        CountingCatalog::with(&[
            ("customfield_10300", "UAT Acceptance Notes"),
            ("customfield_10100", "Acceptance Criteria"),
        ]),
        FieldConfig::default(),
    );

    let id = fields.resolve_field_id(LogicalField::Acceptance).await;

    assert_eq!(id.as_deref(), Some("customfield_10100"));
}

#[rstest]
#[case(LogicalField::Acceptance, "customfield_10300", "UAT Acceptance Notes")]
#[case(LogicalField::Epic, "customfield_10014", "Team Epic  Link")]
#[case(LogicalField::StoryPoints, "customfield_10016", "Story point estimate")]
#[case(LogicalField::StoryPoints, "customfield_10002", "Estimated story points")]
#[case(LogicalField::Sprint, "customfield_10020", "Current sprint")]
#[tokio::test]
async fn falls_back_to_name_patterns(
    #[case] field: LogicalField,
    #[case] id: &str,
    #[case] name: &str,
) {
    let fields = service(
        CountingCatalog::with(&[("summary", "Summary"), (id, name)]),
        FieldConfig::default(),
    );

    assert_eq!(fields.resolve_field_id(field).await.as_deref(), Some(id));
}

#[tokio::test]
async fn candidates_match_ids_case_insensitively_in_priority_order() {
    let config = FieldConfig {
        epic_field_candidates: vec!["Epic Name".to_string(), "CUSTOMFIELD_10008".to_string()],
        ..FieldConfig::default()
    };
    let fields = service(
        CountingCatalog::with(&[
            ("customfield_10014", "Epic Link"),
            ("customfield_10008", "Legacy epic"),
        ]),
        config,
    );

    let id = fields.resolve_field_id(LogicalField::Epic).await;

    assert_eq!(id.as_deref(), Some("customfield_10008"));
}

#[tokio::test]
async fn catalog_failure_resolves_to_none() {
    let fields = service(CountingCatalog::failing(), FieldConfig::default());

    assert_eq!(fields.resolve_field_id(LogicalField::Sprint).await, None);

    let err = fields
        .assert_field_id(LogicalField::StoryPoints)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
    assert!(err.message.contains("story_points"));
}

#[tokio::test]
async fn catalog_is_fetched_once_until_cleared() {
    let catalog = Arc::new(CountingCatalog::with(&[("customfield_10020", "Sprint")]));
    let fields = FieldService::new(Arc::clone(&catalog), FieldConfig::default());

    let (a, b) = futures::join!(
        fields.resolve_field_id(LogicalField::Sprint),
        fields.resolve_field_id(LogicalField::Acceptance),
    );
    assert_eq!(a.as_deref(), Some("customfield_10020"));
    assert_eq!(b, None);
    fields.assert_field_id(LogicalField::Sprint).await.unwrap();
    assert_eq!(catalog.fetches(), 1);

    fields.clear_cache().await;
    fields.field_by_id("customfield_10020").await.unwrap();
    assert_eq!(catalog.fetches(), 2);
}

#[rstest]
#[case("acceptance", LogicalField::Acceptance)]
#[case("epic", LogicalField::Epic)]
#[case("storyPoints", LogicalField::StoryPoints)]
#[case("story_points", LogicalField::StoryPoints)]
#[case(" sprint ", LogicalField::Sprint)]
fn parses_logical_names(#[case] input: &str, #[case] expected: LogicalField) {
    assert_eq!(input.parse::<LogicalField>().unwrap(), expected);
}

#[test]
fn rejects_unknown_logical_name() {
    let err = "priority".parse::<LogicalField>().unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
}

#[test]
fn config_accepts_camel_case_keys() {
    let config: FieldConfig = serde_json::from_value(serde_json::json!({
        "fieldMapping": { "storyPoints": "customfield_10016" },
        "epicStringFields": ["customfield_10008"]
    }))
    .unwrap();

    assert_eq!(
        config.field_mapping.get(LogicalField::StoryPoints),
        Some("customfield_10016")
    );
    assert_eq!(config.epic_string_fields, vec!["customfield_10008"]);
    assert_eq!(
        config.candidates(LogicalField::Acceptance),
        vec!["Acceptance Criteria", "Acceptance criteria", "AC"]
    );
}
