use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap_complete::Shell;
use ledger_core::{
    Installment, LocalRecordStore, LocalStore, MemoryRemoteStore, OwnerSession, Record,
    SkipReason, SyncConfig, SyncConflict, SyncKind, SyncReport,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use crate::commands::common::{
    build_context, format_record_lines, format_sync_conflict_lines, format_sync_report,
    format_sync_timestamp, normalize_description, parse_amount, parse_occurred_at,
    record_to_list_item, sync_report_errors, LedgerContext,
};
use crate::commands::completions::run_completions;
use crate::commands::config::{config_view, merge_config_init, ConfigInitArgs};
use crate::config::{CliConfig, CliRemote};
use crate::error::CliError;

const NEW_YEAR_2024_MS: i64 = 1_704_067_200_000;

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    std::env::temp_dir().join(format!("ledger-cli-{name}-{nanos}"))
}

fn sample_record() -> Record {
    let mut record = Record::new(1, Decimal::new(-1250, 2), "Lunch").occurred_at(NEW_YEAR_2024_MS);
    record.id = Some(4);
    record
}

async fn open_test_context(signed_in: bool) -> (LedgerContext, Arc<MemoryRemoteStore>) {
    let local = Arc::new(LocalRecordStore::open_in_memory().await.unwrap());
    let remote = Arc::new(MemoryRemoteStore::new());
    let session = OwnerSession::new(signed_in.then_some(1));
    let context = build_context(local, remote.clone(), session, 1, SyncConfig::default());
    (context, remote)
}

#[test]
fn parse_amount_accepts_signed_and_grouped_values() {
    assert_eq!(parse_amount("-12.50").unwrap(), Decimal::new(-1250, 2));
    assert_eq!(parse_amount(" 1,200 ").unwrap(), Decimal::new(1200, 0));
    assert!(matches!(
        parse_amount("twelve"),
        Err(CliError::InvalidAmount(value)) if value == "twelve"
    ));
}

#[test]
fn parse_occurred_at_reads_rfc3339() {
    assert_eq!(
        parse_occurred_at(Some("2024-01-01T00:00:00Z")).unwrap(),
        NEW_YEAR_2024_MS
    );
    assert_eq!(
        parse_occurred_at(Some("2024-01-01T01:00:00+01:00")).unwrap(),
        NEW_YEAR_2024_MS
    );
    assert!(matches!(
        parse_occurred_at(Some("yesterday")),
        Err(CliError::InvalidTimestamp(_))
    ));
}

#[test]
fn parse_occurred_at_defaults_to_now() {
    let before = chrono::Utc::now().timestamp_millis();
    let parsed = parse_occurred_at(None).unwrap();
    assert!(parsed >= before);
}

#[test]
fn normalize_description_collapses_whitespace() {
    let parts = vec!["  Coffee ".to_string(), "with\tfriends".to_string()];
    assert_eq!(normalize_description(&parts).unwrap(), "Coffee with friends");
    assert!(matches!(
        normalize_description(&[" ".to_string()]),
        Err(CliError::EmptyDescription)
    ));
}

#[test]
fn record_lines_show_id_date_amount_and_installment() {
    let record = sample_record().with_installment(Installment {
        number: 2,
        total: 6,
    });
    let unidentified = Record::new(1, Decimal::new(3000, 2), "Taxi").occurred_at(NEW_YEAR_2024_MS);

    let lines = format_record_lines(&[record, unidentified]);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("     4  2024-01-01"));
    assert!(lines[0].contains("-12.50"));
    assert!(lines[0].ends_with("Lunch  (2/6)"));
    assert!(lines[1].starts_with("     -  2024-01-01"));
    assert!(lines[1].ends_with("Taxi"));
}

#[test]
fn list_item_carries_iso_date_and_installment() {
    let record = sample_record().with_installment(Installment {
        number: 1,
        total: 3,
    });
    let item = record_to_list_item(&record);
    assert_eq!(item.id, Some(4));
    assert_eq!(item.amount, "-12.5");
    assert_eq!(item.occurred_at_iso, "2024-01-01 00:00:00 UTC");
    assert_eq!(item.installment.as_deref(), Some("1/3"));
}

#[test]
fn sync_timestamp_formats_utc() {
    assert_eq!(
        format_sync_timestamp(NEW_YEAR_2024_MS),
        "2024-01-01 00:00:00 UTC"
    );
}

#[test]
fn sync_conflict_lines_include_record_and_clocks() {
    let conflict = SyncConflict {
        id: 1,
        owner_id: 1,
        record_id: 42,
        local_modified_at: 2_000,
        incoming_modified_at: 1_000,
        resolved_at: NEW_YEAR_2024_MS,
        strategy: "lww".to_string(),
    };
    let lines = format_sync_conflict_lines(&[conflict]);
    assert_eq!(
        lines,
        vec!["2024-01-01 00:00:00 UTC  lww   record=42  local=2000 incoming=1000".to_string()]
    );
}

#[test]
fn sync_report_summary_lists_only_relevant_counters() {
    let quiet = SyncReport {
        kind: SyncKind::Full,
        received: 3,
        unchanged: 3,
        ..SyncReport::default()
    };
    assert_eq!(
        format_sync_report(&quiet),
        "received 3, inserted 0, updated 0, unchanged 3"
    );

    let busy = SyncReport {
        received: 4,
        inserted: 1,
        updated: 1,
        unchanged: 1,
        malformed: 1,
        pushed: 2,
        push_failed: 1,
        ..SyncReport::default()
    };
    assert_eq!(
        format_sync_report(&busy),
        "received 4, inserted 1, updated 1, unchanged 1, pushed 2, push failed 1, malformed 1"
    );
}

#[test]
fn sync_report_errors_join_both_phases() {
    assert_eq!(sync_report_errors(&SyncReport::default()), None);

    let report = SyncReport {
        pull_error: Some("timed out".to_string()),
        push_error: Some("unreachable".to_string()),
        ..SyncReport::default()
    };
    assert_eq!(
        sync_report_errors(&report).as_deref(),
        Some("pull: timed out; push: unreachable")
    );
}

#[test]
fn skipped_sync_error_names_the_reason() {
    let error = CliError::SyncSkipped(SkipReason::NoOwner);
    assert!(error.to_string().starts_with("Sync skipped: "));
}

#[test]
fn config_init_prefers_explicit_values() {
    let existing = CliConfig {
        owner_id: Some(3),
        remote: CliRemote {
            base_url: Some("https://old.example.com".to_string()),
            api_key: Some("old".to_string()),
            collection: None,
        },
        ..CliConfig::default()
    };
    let merged = merge_config_init(
        existing,
        ConfigInitArgs {
            owner: Some(9),
            remote_url: Some("https://new.example.com/rest/v1/".to_string()),
            api_key: Some("new".to_string()),
            collection: Some("expenses".to_string()),
            sync_interval: Some(60),
        },
    )
    .unwrap();

    assert_eq!(merged.owner_id, Some(9));
    assert_eq!(
        merged.remote.base_url.as_deref(),
        Some("https://new.example.com/rest/v1")
    );
    assert_eq!(merged.remote.api_key.as_deref(), Some("new"));
    assert_eq!(merged.remote.collection.as_deref(), Some("expenses"));
    assert_eq!(merged.sync.sync_interval_secs, Some(60));
}

#[test]
fn config_init_rejects_non_http_remote() {
    let result = merge_config_init(
        CliConfig::default(),
        ConfigInitArgs {
            owner: Some(1),
            remote_url: Some("ftp://example.com".to_string()),
            api_key: None,
            collection: None,
            sync_interval: None,
        },
    );
    assert!(matches!(result, Err(CliError::Config(_))));
}

#[test]
fn config_view_never_shows_api_key() {
    let config = CliConfig {
        owner_id: Some(1),
        remote: CliRemote {
            base_url: Some("https://api.example.com".to_string()),
            api_key: Some("secret-key".to_string()),
            collection: None,
        },
        ..CliConfig::default()
    };
    let view = config_view(&config, None).unwrap();
    let json = serde_json::to_string(&view).unwrap();
    assert!(!json.contains("secret-key"));
}

#[test]
fn completions_are_written_to_file() {
    let path = temp_path("completions.bash");
    run_completions(Shell::Bash, Some(&path)).unwrap();

    let script = std::fs::read_to_string(&path).unwrap();
    assert!(script.contains("ledger"));

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn signed_in_save_is_pushed_and_delete_propagates() {
    let (context, remote) = open_test_context(true).await;
    assert!(context.remote_enabled);

    let record = Record::new(1, Decimal::new(-800, 2), "Cinema").occurred_at(NEW_YEAR_2024_MS);
    let outcome = context.engine.save_record(record, false).await.unwrap();
    assert!(outcome.pushed);
    let id = outcome.record.identity().unwrap();
    assert_eq!(remote.documents(1).len(), 1);

    assert!(context.engine.delete_record(id, 1).await.unwrap());
    assert!(context.local.list(1).await.unwrap().is_empty());
    assert!(remote.documents(1).is_empty());
}

#[tokio::test]
async fn local_only_context_keeps_records_off_the_remote() {
    let (context, remote) = open_test_context(false).await;
    assert!(!context.remote_enabled);

    let record = Record::new(1, Decimal::new(500, 2), "Refund").occurred_at(NEW_YEAR_2024_MS);
    let outcome = context.engine.save_record(record, false).await.unwrap();
    assert!(!outcome.pushed);
    assert_eq!(context.local.list(1).await.unwrap().len(), 1);
    assert_eq!(remote.upsert_count(), 0);

    let report = context.engine.full_sync(1).await;
    assert_eq!(report.skipped, Some(SkipReason::NoOwner));
    context.engine.close();
}

#[tokio::test]
async fn deleting_unknown_record_reports_absence() {
    let (context, _remote) = open_test_context(true).await;
    assert!(!context.engine.delete_record(99, 1).await.unwrap());
}
