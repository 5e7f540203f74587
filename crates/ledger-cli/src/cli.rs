use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Track expenses and income from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Owner whose records to use (defaults to the configured owner)
    #[arg(long, global = true, value_name = "ID")]
    pub owner: Option<i64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record an expense or income
    #[command(alias = "new")]
    Add {
        /// Signed amount, e.g. -12.50
        #[arg(allow_negative_numbers = true)]
        amount: String,
        /// Description
        #[arg(required = true)]
        description: Vec<String>,
        /// When it happened (RFC 3339, defaults to now)
        #[arg(long, value_name = "TIMESTAMP")]
        at: Option<String>,
        /// Category id
        #[arg(long, value_name = "ID")]
        category: Option<i64>,
    },
    /// List recent records
    List {
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a record locally and remotely
    Delete {
        /// Record id
        id: i64,
    },
    /// Reconcile local records with the remote collection
    Sync {
        /// Only pull documents modified in the last few minutes
        #[arg(long)]
        incremental: bool,
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Keep syncing in the background until interrupted
    Watch,
    /// Configure the CLI
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update the config file
    Init {
        /// Default owner id
        #[arg(long, value_name = "ID")]
        owner: Option<i64>,
        /// Remote collection endpoint root
        #[arg(long, value_name = "URL")]
        remote_url: Option<String>,
        /// Remote API key
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
        /// Remote collection name
        #[arg(long, value_name = "NAME")]
        collection: Option<String>,
        /// Seconds between background syncs
        #[arg(long, value_name = "SECS")]
        sync_interval: Option<u64>,
    },
    /// Print the effective configuration
    Show,
}
