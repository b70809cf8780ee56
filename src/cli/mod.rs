//! CLI module for PMP SQL Agent
//!
//! Without a subcommand the arguments form a question that is answered once:
//! - `index`: rebuild or inspect the retrieval index
//! - `schema`: print the database catalog
//! - `serve`: run the HTTP API

pub mod ask;
pub mod index;
pub mod schema;
pub mod serve;

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// PMP SQL Agent - Ask questions about a database in plain language
#[derive(Debug, Parser)]
#[command(name = "pmp-sql-agent")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub ask: ask::AskArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the retrieval index
    #[command(subcommand)]
    Index(index::IndexCommand),

    /// Print the tables and columns of the database
    Schema(schema::SchemaArgs),

    /// Run the HTTP API
    Serve,
}

/// Dispatch the parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config()?;
    init_logging(&config);

    match cli.command {
        Some(Command::Index(command)) => index::run(command, &config).await,
        Some(Command::Schema(args)) => schema::run(args, &config).await,
        Some(Command::Serve) => serve::run(&config).await,
        None => ask::run(cli.ask, &config).await,
    }
}

fn load_config() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();
    AppConfig::load().context("failed to load configuration")
}

fn init_logging(config: &AppConfig) {
    logging::init_logging(&config.logging);
}
