use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use ledger_core::{
    IdentityProvider, LocalRecordStore, MemoryRemoteStore, OwnerSession, ReconciliationEngine,
    Record, RemoteStore, RestRemoteStore, SyncConfig, SyncConflict, SyncReport,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::CliConfig;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: Option<i64>,
    pub amount: String,
    pub description: String,
    pub occurred_at: i64,
    pub occurred_at_iso: String,
    pub modified_at: i64,
    pub category_id: Option<i64>,
    pub installment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub owner_id: i64,
    pub record_id: i64,
    pub local_modified_at: i64,
    pub incoming_modified_at: i64,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
    pub strategy: String,
}

/// Everything a command needs to read and write records for one owner
pub struct LedgerContext {
    pub engine: Arc<ReconciliationEngine>,
    pub local: Arc<LocalRecordStore>,
    pub session: OwnerSession,
    pub owner_id: i64,
    pub remote_enabled: bool,
}

#[derive(Clone, Copy)]
enum OpenMode {
    Standard,
    RequireRemote,
}

impl OpenMode {
    const fn requires_remote(self) -> bool {
        matches!(self, Self::RequireRemote)
    }
}

pub async fn open_context(
    db_path: &Path,
    owner: Option<i64>,
) -> Result<LedgerContext, CliError> {
    open_context_with_mode(db_path, owner, OpenMode::Standard).await
}

pub async fn open_sync_context(
    db_path: &Path,
    owner: Option<i64>,
) -> Result<LedgerContext, CliError> {
    open_context_with_mode(db_path, owner, OpenMode::RequireRemote).await
}

async fn open_context_with_mode(
    db_path: &Path,
    owner: Option<i64>,
    mode: OpenMode,
) -> Result<LedgerContext, CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?;
    let owner_id = config
        .resolve_owner(owner)
        .ok_or(CliError::OwnerNotConfigured)?;
    let sync_config = config.sync_config().map_err(CliError::Config)?;

    let remote_config = config.resolve_remote();
    if remote_config.is_none() && mode.requires_remote() {
        return Err(CliError::SyncNotConfigured);
    }

    let local = Arc::new(LocalRecordStore::open_path(db_path).await?);
    let (remote, session) = match remote_config {
        Some(remote_config) => {
            tracing::debug!("Remote sync enabled for collection '{}'", remote_config.collection);
            let store: Arc<dyn RemoteStore> =
                Arc::new(RestRemoteStore::new(remote_config, sync_config.call_timeout)?);
            (store, OwnerSession::new(Some(owner_id)))
        }
        None => {
            // Nobody signed in, so the engine keeps everything local
            let store: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());
            (store, OwnerSession::new(None))
        }
    };

    Ok(build_context(local, remote, session, owner_id, sync_config))
}

pub fn build_context(
    local: Arc<LocalRecordStore>,
    remote: Arc<dyn RemoteStore>,
    session: OwnerSession,
    owner_id: i64,
    sync_config: SyncConfig,
) -> LedgerContext {
    let remote_enabled = session.current_owner_id() == Some(owner_id);
    let engine = ReconciliationEngine::open(
        local.clone(),
        remote,
        Arc::new(session.clone()),
        sync_config,
    );
    LedgerContext {
        engine,
        local,
        session,
        owner_id,
        remote_enabled,
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("LEDGER_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ledger")
        .join("ledger.db")
}

pub fn parse_amount(value: &str) -> Result<Decimal, CliError> {
    let trimmed = value.trim().replace(',', "");
    Decimal::from_str(&trimmed).map_err(|_| CliError::InvalidAmount(value.to_string()))
}

pub fn parse_occurred_at(value: Option<&str>) -> Result<i64, CliError> {
    let Some(value) = value else {
        return Ok(Utc::now().timestamp_millis());
    };
    chrono::DateTime::parse_from_rfc3339(value.trim())
        .map(|date_time| date_time.timestamp_millis())
        .map_err(|_| CliError::InvalidTimestamp(value.to_string()))
}

pub fn normalize_description(parts: &[String]) -> Result<String, CliError> {
    let joined = parts.join(" ");
    let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        Err(CliError::EmptyDescription)
    } else {
        Ok(collapsed)
    }
}

pub fn record_to_list_item(record: &Record) -> RecordListItem {
    RecordListItem {
        id: record.identity(),
        amount: record.amount.normalize().to_string(),
        description: record.description.clone(),
        occurred_at: record.occurred_at,
        occurred_at_iso: format_sync_timestamp(record.occurred_at),
        modified_at: record.modified_at,
        category_id: record.category_id,
        installment: record
            .installment
            .map(|plan| format!("{}/{}", plan.number, plan.total)),
    }
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let id = record
                .identity()
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            let date = chrono::DateTime::from_timestamp_millis(record.occurred_at).map_or_else(
                || record.occurred_at.to_string(),
                |date_time| date_time.format("%Y-%m-%d").to_string(),
            );
            let amount = format!("{:.2}", record.amount);
            let mut line = format!("{id:>6}  {date}  {amount:>12}  {}", record.description);
            if let Some(plan) = record.installment {
                line.push_str(&format!("  ({}/{})", plan.number, plan.total));
            }
            line
        })
        .collect()
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        owner_id: conflict.owner_id,
        record_id: conflict.record_id,
        local_modified_at: conflict.local_modified_at,
        incoming_modified_at: conflict.incoming_modified_at,
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
        strategy: conflict.strategy.clone(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<4}  record={}  local={} incoming={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.strategy,
                conflict.record_id,
                conflict.local_modified_at,
                conflict.incoming_modified_at
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_sync_report(report: &SyncReport) -> String {
    let mut summary = format!(
        "received {}, inserted {}, updated {}, unchanged {}",
        report.received, report.inserted, report.updated, report.unchanged
    );
    if report.pushed > 0 || report.push_failed > 0 {
        summary.push_str(&format!(", pushed {}", report.pushed));
    }
    if report.push_failed > 0 {
        summary.push_str(&format!(", push failed {}", report.push_failed));
    }
    if report.malformed > 0 {
        summary.push_str(&format!(", malformed {}", report.malformed));
    }
    if report.in_flight > 0 {
        summary.push_str(&format!(", in flight {}", report.in_flight));
    }
    if report.write_failed > 0 {
        summary.push_str(&format!(", write failed {}", report.write_failed));
    }
    if report.index_unavailable {
        summary.push_str(", remote index unavailable");
    }
    summary
}

/// Phase errors of a finished report, joined for display
pub fn sync_report_errors(report: &SyncReport) -> Option<String> {
    let errors = [
        report.pull_error.as_ref().map(|error| format!("pull: {error}")),
        report.push_error.as_ref().map(|error| format!("push: {error}")),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();

    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}
