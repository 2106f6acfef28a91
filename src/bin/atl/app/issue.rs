use std::fs;
use std::path::Path;

use anyhow::Context as _;
use serde_json::json;

use atl::{
    creation::{create_with_fallback, FieldCandidates, LegacyCreateRequest},
    issue::{CreateIssueInput, IssueService, UpdateIssueInput},
    AppError,
};

use crate::args::{CreateArgs, IssueCommand};

use super::{print_json, Context};

pub(super) async fn handle(cmd: IssueCommand, ctx: &Context) -> anyhow::Result<()> {
    let jira = ctx.jira()?;
    match cmd {
        IssueCommand::Get { key, fields } => print_json(&jira.get_issue(&key, &fields).await?),
        IssueCommand::Search {
            jql,
            max_results,
            fields,
        } => print_json(&jira.search(&jql, max_results, &fields).await?),
        IssueCommand::Create(args) => {
            let legacy = args.legacy;
            let acceptance_field = args.acceptance_field.clone();
            let epic_field = args.epic_field.clone();
            let input = create_input(args)?;
            if legacy {
                let candidates =
                    FieldCandidates::from_env(acceptance_field.as_deref(), epic_field.as_deref());
                let request = LegacyCreateRequest::from_input(&input)?;
                let outcome = create_with_fallback(jira.as_ref(), &request, &candidates).await?;
                print_json(&outcome)
            } else {
                let issues = IssueService::new(ctx.field_service(&jira));
                print_json(&issues.create_issue(jira.as_ref(), &input).await?)
            }
        }
        IssueCommand::Update(args) => {
            let issues = IssueService::new(ctx.field_service(&jira));
            let input = UpdateIssueInput::from(args.fields);
            let payload = issues.build_update_payload(&input).await?;
            jira.update_issue(&args.key, &payload).await?;
            print_json(&json!({ "key": args.key, "updated": payload["fields"] }))
        }
        IssueCommand::Transition { key, target } => {
            print_json(&jira.transition_issue(&key, &target).await?)
        }
    }
}

fn create_input(args: CreateArgs) -> anyhow::Result<CreateIssueInput> {
    let base = match &args.file {
        Some(path) => read_issue_file(path)?,
        None => CreateIssueInput::default(),
    };
    Ok(args.into_input(base))
}

fn read_issue_file(path: &Path) -> anyhow::Result<CreateIssueInput> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&contents).map_err(|err| {
        AppError::validation(format!("invalid issue file {}: {err}", path.display()))
            .with_cause(err)
            .into()
    })
}
