use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};

use atl::issue::{CreateIssueInput, UpdateIssueInput};

#[derive(Parser, Debug)]
#[command(
    name = "atl",
    version,
    about = "Create, read, update and search Jira issues and Confluence pages"
)]
pub struct CliArgs {
    /// Config file (default: ~/.config/atl/config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,
    /// Verbose logging and full error causes
    #[arg(long, global = true)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Jira issues
    #[command(subcommand)]
    Issue(IssueCommand),
    /// Confluence pages
    #[command(subcommand)]
    Page(PageCommand),
    /// Jira custom field discovery
    #[command(subcommand)]
    Field(FieldCommand),
}

#[derive(Subcommand, Debug)]
pub enum IssueCommand {
    Get {
        key: String,
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    Search {
        jql: String,
        #[arg(long, default_value_t = 50)]
        max_results: u32,
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },
    Create(CreateArgs),
    Update(UpdateArgs),
    /// Move an issue by transition id, transition name or target status
    Transition { key: String, target: String },
}

#[derive(Args, Debug, Default)]
pub struct IssueFields {
    #[arg(long)]
    pub summary: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, value_delimiter = ',')]
    pub labels: Option<Vec<String>>,
    #[arg(long, value_delimiter = ',')]
    pub components: Option<Vec<String>>,
    #[arg(long)]
    pub priority: Option<String>,
    /// Assignee account id
    #[arg(long)]
    pub assignee: Option<String>,
    #[arg(long)]
    pub acceptance_criteria: Option<String>,
    /// Epic issue key
    #[arg(long)]
    pub epic: Option<String>,
    #[arg(long)]
    pub story_points: Option<f64>,
    /// Sprint id
    #[arg(long)]
    pub sprint: Option<u64>,
    /// Raw field as FIELD_ID=VALUE; VALUE is parsed as JSON when possible
    #[arg(long = "field", value_parser = parse_field)]
    pub custom: Vec<(String, Value)>,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// YAML file with the issue; flags override its values
    #[arg(long)]
    pub file: Option<PathBuf>,
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long = "type")]
    pub issue_type: Option<String>,
    #[command(flatten)]
    pub fields: IssueFields,
    /// Create through the field fallback protocol
    #[arg(long)]
    pub legacy: bool,
    /// Acceptance criteria field id tried first by --legacy
    #[arg(long, requires = "legacy")]
    pub acceptance_field: Option<String>,
    /// Epic field id tried first by --legacy
    #[arg(long, requires = "legacy")]
    pub epic_field: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub key: String,
    #[command(flatten)]
    pub fields: IssueFields,
}

#[derive(Subcommand, Debug)]
pub enum PageCommand {
    Get {
        id: String,
    },
    /// Look a page up by space and exact title
    Find {
        #[arg(long)]
        space: String,
        #[arg(long)]
        title: String,
    },
    Search {
        cql: String,
        #[arg(long, default_value_t = 25)]
        limit: u32,
    },
    Create {
        #[arg(long)]
        space: String,
        #[arg(long)]
        title: String,
        #[command(flatten)]
        body: BodyArgs,
        #[arg(long)]
        parent: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        title: String,
        #[command(flatten)]
        body: BodyArgs,
        /// Version to write; defaults to the current version + 1
        #[arg(long)]
        version: Option<u64>,
    },
}

/// Page body in storage format, inline or from a file.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct BodyArgs {
    #[arg(long)]
    pub body: Option<String>,
    #[arg(long)]
    pub body_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum FieldCommand {
    /// Resolve logical fields (acceptance, epic, storyPoints, sprint) to field ids
    Resolve { names: Vec<String> },
    /// Print the site's field catalog
    List {
        /// Only custom fields
        #[arg(long)]
        custom: bool,
    },
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD_ID=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field id in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn custom_map(custom: Vec<(String, Value)>) -> Map<String, Value> {
    custom.into_iter().collect()
}

impl CreateArgs {
    /// Applies the flags over `base`, typically read from `--file`.
    pub fn into_input(self, mut base: CreateIssueInput) -> CreateIssueInput {
        let fields = self.fields;
        if let Some(project) = self.project {
            base.project = project;
        }
        if let Some(issue_type) = self.issue_type {
            base.issue_type = issue_type;
        }
        if let Some(summary) = fields.summary {
            base.summary = summary;
        }
        if let Some(labels) = fields.labels {
            base.labels = labels;
        }
        if let Some(components) = fields.components {
            base.components = components;
        }
        base.description = fields.description.or(base.description);
        base.priority = fields.priority.or(base.priority);
        base.assignee = fields.assignee.or(base.assignee);
        base.acceptance_criteria = fields.acceptance_criteria.or(base.acceptance_criteria);
        base.epic = fields.epic.or(base.epic);
        base.story_points = fields.story_points.or(base.story_points);
        base.sprint = fields.sprint.or(base.sprint);
        base.custom_fields.extend(custom_map(fields.custom));
        base
    }
}

impl From<IssueFields> for UpdateIssueInput {
    fn from(fields: IssueFields) -> Self {
        Self {
            summary: fields.summary,
            description: fields.description,
            labels: fields.labels,
            components: fields.components,
            priority: fields.priority,
            assignee: fields.assignee,
            acceptance_criteria: fields.acceptance_criteria,
            epic: fields.epic,
            story_points: fields.story_points,
            sprint: fields.sprint,
            custom_fields: custom_map(fields.custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use serde_json::json;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn field_values_parse_as_json_or_text() {
        assert_eq!(
            parse_field("customfield_1={\"value\":\"High\"}").unwrap(),
            ("customfield_1".to_string(), json!({ "value": "High" }))
        );
        assert_eq!(
            parse_field("customfield_2=5").unwrap().1,
            json!(5)
        );
        assert_eq!(
            parse_field("customfield_3=plain text").unwrap().1,
            json!("plain text")
        );
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=x").is_err());
    }

    #[test]
    fn create_flags_override_file_values() {
        let args = CliArgs::try_parse_from([
            "atl",
            "issue",
            "create",
            "--project",
            "OPS",
            "--summary",
            "Rotate keys",
            "--labels",
            "sec,infra",
            "--field",
            "customfield_9=1",
            "--legacy",
            "--epic-field",
            "customfield_10008",
        ])
        .unwrap();
        let Command::Issue(IssueCommand::Create(create)) = args.command else {
            panic!("expected issue create");
        };
        assert!(create.legacy);
        assert_eq!(create.epic_field.as_deref(), Some("customfield_10008"));

        let base = CreateIssueInput {
            project: "PROJ".to_string(),
            issue_type: "Task".to_string(),
            summary: "from file".to_string(),
            ..CreateIssueInput::default()
        };
        let input = create.into_input(base);

        assert_eq!(input.project, "OPS");
        assert_eq!(input.issue_type, "Task");
        assert_eq!(input.summary, "Rotate keys");
        assert_eq!(input.labels, vec!["sec", "infra"]);
        assert_eq!(input.custom_fields["customfield_9"], json!(1));
    }

    #[test]
    fn legacy_overrides_require_legacy() {
        let err = CliArgs::try_parse_from([
            "atl",
            "issue",
            "create",
            "--acceptance-field",
            "customfield_1",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn page_body_is_required_once() {
        assert!(CliArgs::try_parse_from([
            "atl", "page", "create", "--space", "DOC", "--title", "T"
        ])
        .is_err());
        assert!(CliArgs::try_parse_from([
            "atl", "page", "update", "42", "--title", "T", "--body", "<p/>", "--body-file", "x"
        ])
        .is_err());
    }
}
