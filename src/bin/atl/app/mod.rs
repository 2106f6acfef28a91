mod fields;
mod issue;
mod page;
mod report;

use std::sync::Arc;

use serde::Serialize;

use atl::{
    fields::FieldService, AppError, CircuitRegistry, ResilientConfluenceClient,
    ResilientJiraClient,
};

use crate::args::{CliArgs, Command};
use crate::config::{load_config, AppConfig};
use crate::logging::init_logging;

pub use report::report;

pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let loaded = load_config(args.config.clone())?;
    let _logger = init_logging(&loaded.config.logging, &loaded.paths, args.debug)?;
    if !loaded.config_exists {
        log::debug!(
            "no config file at {}, using defaults and environment",
            loaded.paths.config_file.display()
        );
    }

    let ctx = Context::new(loaded.config);
    match args.command {
        Command::Issue(cmd) => issue::handle(cmd, &ctx).await,
        Command::Page(cmd) => page::handle(cmd, &ctx).await,
        Command::Field(cmd) => fields::handle(cmd, &ctx).await,
    }
}

/// Everything a command handler needs; clients share one circuit registry.
pub(crate) struct Context {
    config: AppConfig,
    registry: CircuitRegistry,
}

impl Context {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: CircuitRegistry::new(),
        }
    }

    pub(crate) fn jira(&self) -> Result<Arc<ResilientJiraClient>, AppError> {
        let jira = &self.config.jira;
        jira.require_configured("Jira")?;
        let client = jira
            .builder(&self.config.resilience, &self.registry)
            .build_jira()?;
        Ok(Arc::new(client))
    }

    pub(crate) fn confluence(&self) -> Result<ResilientConfluenceClient, AppError> {
        let confluence = &self.config.confluence;
        confluence.require_configured("Confluence")?;
        confluence
            .builder(&self.config.resilience, &self.registry)
            .build_confluence()
    }

    pub(crate) fn field_service(
        &self,
        jira: &Arc<ResilientJiraClient>,
    ) -> Arc<FieldService<Arc<ResilientJiraClient>>> {
        Arc::new(FieldService::new(Arc::clone(jira), self.config.fields.clone()))
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
