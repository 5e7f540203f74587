use std::path::Path;

use crate::commands::common::{
    format_sync_conflict_lines, format_sync_report, open_context, open_sync_context,
    sync_conflict_to_item, sync_report_errors, SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_sync(
    incremental: bool,
    owner: Option<i64>,
    db_path: &Path,
) -> Result<(), CliError> {
    let context = open_sync_context(db_path, owner).await?;

    let report = if incremental {
        context.engine.incremental_sync(context.owner_id).await
    } else {
        context.engine.full_sync(context.owner_id).await
    };
    context.engine.close();

    if let Some(reason) = report.skipped {
        return Err(CliError::SyncSkipped(reason));
    }

    println!("Sync completed: {}", format_sync_report(&report));
    if let Some(errors) = sync_report_errors(&report) {
        return Err(CliError::SyncFailed(errors));
    }
    Ok(())
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    owner: Option<i64>,
    db_path: &Path,
) -> Result<(), CliError> {
    let context = open_context(db_path, owner).await?;
    let conflicts = context.local.list_conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}
