use std::fs;

use anyhow::Context as _;

use atl::models::{CreatePageInput, UpdatePageInput};

use crate::args::{BodyArgs, PageCommand};

use super::{print_json, Context};

pub(super) async fn handle(cmd: PageCommand, ctx: &Context) -> anyhow::Result<()> {
    let confluence = ctx.confluence()?;
    match cmd {
        PageCommand::Get { id } => print_json(&confluence.get_page_by_id(&id).await?),
        PageCommand::Find { space, title } => {
            match confluence.get_page_by_title(&space, &title).await? {
                Some(page) => print_json(&page),
                None => Err(atl::AppError::validation(format!(
                    "no page titled '{title}' in space {space}"
                ))
                .into()),
            }
        }
        PageCommand::Search { cql, limit } => print_json(&confluence.search(&cql, limit).await?),
        PageCommand::Create {
            space,
            title,
            body,
            parent,
        } => {
            let input = CreatePageInput {
                space_key: space,
                title,
                body: read_body(body)?,
                parent_id: parent,
            };
            print_json(&confluence.create_page(&input).await?)
        }
        PageCommand::Update {
            id,
            title,
            body,
            version,
        } => {
            let input = UpdatePageInput {
                id,
                title,
                body: read_body(body)?,
                version,
            };
            print_json(&confluence.update_page(&input).await?)
        }
    }
}

fn read_body(args: BodyArgs) -> anyhow::Result<String> {
    match (args.body, args.body_file) {
        (Some(body), _) => Ok(body),
        (None, Some(path)) => {
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
        }
        (None, None) => Ok(String::new()),
    }
}
