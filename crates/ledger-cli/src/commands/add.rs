use std::path::Path;

use ledger_core::Record;

use crate::commands::common::{normalize_description, open_context, parse_amount, parse_occurred_at};
use crate::error::CliError;

pub struct AddArgs<'a> {
    pub amount: &'a str,
    pub description: &'a [String],
    pub at: Option<&'a str>,
    pub category: Option<i64>,
}

pub async fn run_add(
    args: AddArgs<'_>,
    owner: Option<i64>,
    db_path: &Path,
) -> Result<(), CliError> {
    let amount = parse_amount(args.amount)?;
    let description = normalize_description(args.description)?;
    let occurred_at = parse_occurred_at(args.at)?;

    let context = open_context(db_path, owner).await?;
    let mut record = Record::new(context.owner_id, amount, description).occurred_at(occurred_at);
    if let Some(category_id) = args.category {
        record = record.with_category(category_id);
    }

    let outcome = context.engine.save_record(record, false).await?;
    let id = outcome.record.identity().unwrap_or_default();
    if outcome.pushed || !context.remote_enabled {
        println!("{id}");
    } else {
        println!("{id} (saved locally; will sync later)");
    }
    Ok(())
}
