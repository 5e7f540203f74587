use std::io;

use ledger_core::{RemoteError, SkipReason};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] ledger_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No record description provided")]
    EmptyDescription,
    #[error("Invalid amount '{0}'")]
    InvalidAmount(String),
    #[error("Invalid timestamp '{0}'; expected RFC 3339 such as 2024-01-01T09:00:00Z")]
    InvalidTimestamp(String),
    #[error("Record not found: {0}")]
    RecordNotFound(i64),
    #[error("No owner configured. Pass --owner <ID> or run `ledger config init --owner <ID>`.")]
    OwnerNotConfigured,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Sync skipped: {0}")]
    SyncSkipped(SkipReason),
    #[error("Sync finished with errors: {0}")]
    SyncFailed(String),
    #[error(
        "Sync is not configured. Run `ledger config init --remote-url <URL> --api-key <KEY>`, or set LEDGER_REMOTE_URL and LEDGER_REMOTE_API_KEY."
    )]
    SyncNotConfigured,
}
