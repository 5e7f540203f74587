use std::path::Path;
use std::sync::Arc;

use ledger_core::SyncScheduler;
use tokio_stream::StreamExt;

use crate::commands::common::open_sync_context;
use crate::error::CliError;

/// Run the scheduler for the configured owner until Ctrl-C.
pub async fn run_watch(owner: Option<i64>, db_path: &Path) -> Result<(), CliError> {
    let context = open_sync_context(db_path, owner).await?;
    let engine = context.engine.clone();

    let scheduler = Arc::new(SyncScheduler::new(engine.clone(), engine.config()));
    let follower = scheduler.follow(&context.session);

    let mut progress = engine.progress().progress_stream();
    let mut changes = engine.progress().data_changed_stream();
    println!(
        "Watching owner {} every {:?}; press Ctrl-C to stop.",
        context.owner_id,
        engine.config().sync_interval
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            Some(percent) = progress.next() => {
                if percent > 0 {
                    println!("Sync progress: {percent}%");
                }
            }
            Some(changed) = changes.next() => {
                if changed {
                    println!("Local records updated");
                }
            }
        }
    }

    follower.abort();
    scheduler.stop();
    engine.close();
    println!("Stopped.");
    Ok(())
}
