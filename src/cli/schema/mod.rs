//! Schema command - prints the catalog the agent works against

use std::process::ExitCode;

use clap::Args;

use crate::api::schema::SchemaView;
use crate::config::AppConfig;

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Print `{table: [{name, type}]}` instead of one line per table
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: SchemaArgs, config: &AppConfig) -> anyhow::Result<ExitCode> {
    let (_, catalog) = crate::connect_database(config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&SchemaView::from(&catalog))?);
    } else {
        println!("{}", catalog.render_all());
    }

    Ok(ExitCode::SUCCESS)
}
