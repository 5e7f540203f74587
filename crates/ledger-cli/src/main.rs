//! Ledger CLI - record expenses and income from the terminal
//!
//! Works offline against a local database and reconciles with a shared
//! remote collection when one is configured.

mod cli;
mod commands;
mod config;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::add::{run_add, AddArgs};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::sync::{run_sync, run_sync_conflicts};
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ledger=info")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let owner = cli.owner;

    match cli.command {
        Commands::Add {
            amount,
            description,
            at,
            category,
        } => {
            let args = AddArgs {
                amount: &amount,
                description: &description,
                at: at.as_deref(),
                category,
            };
            run_add(args, owner, &db_path).await?;
        }
        Commands::List { limit, json } => run_list(limit, json, owner, &db_path).await?,
        Commands::Delete { id } => run_delete(id, owner, &db_path).await?,
        Commands::Sync {
            incremental,
            command,
        } => match command {
            Some(SyncCommands::Conflicts { limit, json }) => {
                run_sync_conflicts(limit, json, owner, &db_path).await?;
            }
            None => run_sync(incremental, owner, &db_path).await?,
        },
        Commands::Watch => run_watch(owner, &db_path).await?,
        Commands::Config { command } => run_config(command, owner)?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
