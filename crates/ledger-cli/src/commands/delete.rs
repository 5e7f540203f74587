use std::path::Path;

use crate::commands::common::open_context;
use crate::error::CliError;

pub async fn run_delete(id: i64, owner: Option<i64>, db_path: &Path) -> Result<(), CliError> {
    let context = open_context(db_path, owner).await?;
    if !context.engine.delete_record(id, context.owner_id).await? {
        return Err(CliError::RecordNotFound(id));
    }

    println!("{id}");
    Ok(())
}
