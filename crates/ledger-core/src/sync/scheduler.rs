//! Periodic sync driver.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::engine::ReconciliationEngine;
use crate::config::SyncConfig;
use crate::store::OwnerSession;

struct Running {
    owner_id: i64,
    task: JoinHandle<()>,
}

/// Drives the engine on a timer while an owner is signed in.
///
/// `start` runs one full sync right away, then an incremental sync every
/// `sync_interval`; every `full_sync_every`-th tick runs a full sync instead.
/// Each sync runs on its own task, so stopping the timer never interrupts a
/// pass halfway through a record. Dropping the scheduler stops it.
pub struct SyncScheduler {
    engine: Arc<ReconciliationEngine>,
    interval: Duration,
    full_sync_every: u32,
    state: Mutex<Option<Running>>,
}

impl SyncScheduler {
    pub fn new(engine: Arc<ReconciliationEngine>, config: &SyncConfig) -> Self {
        Self {
            engine,
            interval: config.sync_interval,
            full_sync_every: config.full_sync_every,
            state: Mutex::new(None),
        }
    }

    /// Start syncing for `owner_id`, restarting the timer if already running
    pub fn start(&self, owner_id: i64) {
        let mut state = self.state.lock();
        if let Some(previous) = state.take() {
            previous.task.abort();
        }

        let task = tokio::spawn(run_timer(
            self.engine.clone(),
            owner_id,
            self.interval,
            self.full_sync_every,
        ));
        *state = Some(Running { owner_id, task });
        tracing::info!(owner_id, "Sync scheduler started, interval {:?}", self.interval);
    }

    /// Cancel the timer. Passes already running finish on their own.
    pub fn stop(&self) {
        if let Some(running) = self.state.lock().take() {
            running.task.abort();
            tracing::info!(owner_id = running.owner_id, "Sync scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Owner the timer is running for
    pub fn owner_id(&self) -> Option<i64> {
        self.state.lock().as_ref().map(|running| running.owner_id)
    }

    /// Start on sign-in, restart on owner change and stop on sign-out.
    ///
    /// The returned task ends when the session is gone or the scheduler is
    /// dropped.
    pub fn follow(self: &Arc<Self>, session: &OwnerSession) -> JoinHandle<()> {
        let mut owners = session.subscribe();
        let scheduler = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let owner = *owners.borrow_and_update();
                let Some(scheduler) = scheduler.upgrade() else {
                    break;
                };
                match owner {
                    Some(owner_id) if scheduler.owner_id() != Some(owner_id) => {
                        scheduler.start(owner_id);
                    }
                    Some(_) => {}
                    None => scheduler.stop(),
                }
                drop(scheduler);

                if owners.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_timer(
    engine: Arc<ReconciliationEngine>,
    owner_id: i64,
    period: Duration,
    full_sync_every: u32,
) {
    // Owner just became available
    let initial = engine.clone();
    tokio::spawn(async move {
        initial.full_sync_if_idle(owner_id).await;
    });

    let period = period.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: u64 = 0;

    loop {
        ticker.tick().await;
        if engine.is_closed() {
            tracing::debug!(owner_id, "Engine closed; sync timer exiting");
            break;
        }
        ticks += 1;

        let engine = engine.clone();
        if full_sync_every > 0 && ticks % u64::from(full_sync_every) == 0 {
            tokio::spawn(async move {
                engine.full_sync_if_idle(owner_id).await;
            });
        } else {
            tokio::spawn(async move {
                engine.incremental_sync(owner_id).await;
            });
        }
    }
}
