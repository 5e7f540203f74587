use std::path::Path;

use ledger_core::LocalStore;

use crate::commands::common::{
    format_record_lines, open_context, record_to_list_item, RecordListItem,
};
use crate::error::CliError;

pub async fn run_list(
    limit: usize,
    as_json: bool,
    owner: Option<i64>,
    db_path: &Path,
) -> Result<(), CliError> {
    let context = open_context(db_path, owner).await?;
    let mut records = context.local.list(context.owner_id).await?;
    records.truncate(limit);

    if as_json {
        let json_items = records
            .iter()
            .map(record_to_list_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("No records yet.");
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}
