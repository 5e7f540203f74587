use std::env;

use ledger_core::util::normalize_text_option;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::config::{default_config_path, CliConfig};
use crate::error::CliError;

pub struct ConfigInitArgs {
    pub owner: Option<i64>,
    pub remote_url: Option<String>,
    pub api_key: Option<String>,
    pub collection: Option<String>,
    pub sync_interval: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub config_path: String,
    pub owner_id: Option<i64>,
    pub remote_url: Option<String>,
    pub api_key: Option<String>,
    pub collection: Option<String>,
    pub sync_interval_secs: u64,
    pub full_sync_every: u32,
    pub incremental_window_secs: u64,
    pub call_timeout_secs: u64,
    pub full_sync_tolerance_secs: u64,
    pub incremental_tolerance_secs: u64,
}

pub fn run_config(command: ConfigCommands, global_owner: Option<i64>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            owner,
            remote_url,
            api_key,
            collection,
            sync_interval,
        } => run_config_init(ConfigInitArgs {
            owner: owner.or(global_owner),
            remote_url,
            api_key,
            collection,
            sync_interval,
        }),
        ConfigCommands::Show => run_config_show(global_owner),
    }
}

pub fn run_config_init(args: ConfigInitArgs) -> Result<(), CliError> {
    let existing = CliConfig::load().map_err(CliError::Config)?;
    let config = merge_config_init(existing, args)?;

    let path = config.save().map_err(CliError::Config)?;
    println!("Config written to {}", path.display());

    let mut missing_fields = Vec::new();
    if config.owner_id.is_none() {
        missing_fields.push("owner");
    }
    if config.remote.base_url.is_none() {
        missing_fields.push("remote_url");
    }
    if config.remote.api_key.is_none() {
        missing_fields.push("api_key");
    }
    if missing_fields.is_empty() {
        println!("Remote sync is ready. Run `ledger sync` or `ledger watch`.");
    } else {
        println!("Config is missing: {}", missing_fields.join(", "));
    }
    Ok(())
}

/// Explicit values, then environment, then what the file already holds
pub fn merge_config_init(
    mut config: CliConfig,
    args: ConfigInitArgs,
) -> Result<CliConfig, CliError> {
    config.owner_id = args.owner.or(config.owner_id);

    config.remote.base_url = normalize_text_option(args.remote_url)
        .or_else(|| normalize_text_option(env::var("LEDGER_REMOTE_URL").ok()))
        .or(config.remote.base_url)
        .map(|url| url.trim_end_matches('/').to_string());
    config.remote.api_key = normalize_text_option(args.api_key)
        .or_else(|| normalize_text_option(env::var("LEDGER_REMOTE_API_KEY").ok()))
        .or(config.remote.api_key);
    config.remote.collection = normalize_text_option(args.collection)
        .or_else(|| normalize_text_option(env::var("LEDGER_REMOTE_COLLECTION").ok()))
        .or(config.remote.collection);

    if let Some(secs) = args.sync_interval {
        config.sync.sync_interval_secs = Some(secs);
    }

    config.remote.validate().map_err(CliError::Config)?;
    config.sync_config().map_err(CliError::Config)?;
    Ok(config)
}

pub fn run_config_show(global_owner: Option<i64>) -> Result<(), CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?;
    let view = config_view(&config, global_owner)?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

pub fn config_view(config: &CliConfig, global_owner: Option<i64>) -> Result<ConfigView, CliError> {
    let sync = config.sync_config().map_err(CliError::Config)?;
    let remote = config.resolve_remote();

    Ok(ConfigView {
        config_path: default_config_path().display().to_string(),
        owner_id: config.resolve_owner(global_owner),
        remote_url: remote.as_ref().map(|remote| remote.base_url.clone()),
        api_key: remote.as_ref().map(|_| "[REDACTED]".to_string()),
        collection: remote.map(|remote| remote.collection),
        sync_interval_secs: sync.sync_interval.as_secs(),
        full_sync_every: sync.full_sync_every,
        incremental_window_secs: sync.incremental_window.as_secs(),
        call_timeout_secs: sync.call_timeout.as_secs(),
        full_sync_tolerance_secs: sync.full_sync_tolerance.as_secs(),
        incremental_tolerance_secs: sync.incremental_tolerance.as_secs(),
    })
}
