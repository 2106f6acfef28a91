use std::collections::BTreeMap;

use atl::fields::LogicalField;

use crate::args::FieldCommand;

use super::{print_json, Context};

pub(super) async fn handle(cmd: FieldCommand, ctx: &Context) -> anyhow::Result<()> {
    let jira = ctx.jira()?;
    match cmd {
        FieldCommand::Resolve { names } => {
            let wanted = if names.is_empty() {
                LogicalField::ALL.to_vec()
            } else {
                names
                    .iter()
                    .map(|name| name.parse())
                    .collect::<Result<Vec<LogicalField>, _>>()?
            };
            let fields = ctx.field_service(&jira);
            let mut resolved = BTreeMap::new();
            for field in wanted {
                resolved.insert(field.as_str(), fields.resolve_field_id(field).await);
            }
            print_json(&resolved)
        }
        FieldCommand::List { custom } => {
            let mut fields = jira.list_fields().await?;
            if custom {
                fields.retain(|field| field.custom);
            }
            fields.sort_by(|a, b| a.name.cmp(&b.name));
            print_json(&fields)
        }
    }
}
