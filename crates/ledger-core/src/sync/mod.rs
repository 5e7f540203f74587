//! Reconciliation between the local record store and the remote document store.
//!
//! [`ReconciliationEngine`] owns every piece of mutable sync state: the
//! in-flight set, the running flags and the progress channels. The
//! [`SyncScheduler`] drives it on a timer; everything else calls its public
//! operations.

mod engine;
mod id_coordinator;
mod in_flight;
mod matcher;
mod progress;
mod scheduler;


use std::future::Future;
use std::time::Duration;

pub use engine::{ReconciliationEngine, SaveOutcome, SkipReason, SyncKind, SyncReport};
pub use id_coordinator::IdCoordinator;
pub use matcher::{MatchResolver, MatchTolerance};
pub use progress::ProgressReporter;
pub use scheduler::SyncScheduler;

use crate::error::{Error, Result};
use crate::store::{RemoteError, RemoteResult};

/// Run a remote call under a deadline; expiry becomes [`RemoteError::Timeout`].
pub(crate) async fn remote_deadline<T>(
    deadline: Duration,
    call: impl Future<Output = RemoteResult<T>>,
) -> RemoteResult<T> {
    tokio::time::timeout(deadline, call)
        .await
        .unwrap_or(Err(RemoteError::Timeout(deadline)))
}

/// Run a local store call under a deadline.
pub(crate) async fn local_deadline<T>(
    deadline: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(deadline, call)
        .await
        .unwrap_or_else(|_| {
            Err(Error::Database(format!(
                "local store call timed out after {deadline:?}"
            )))
        })
}
