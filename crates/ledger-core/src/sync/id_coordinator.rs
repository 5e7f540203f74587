//! Identity assignment spanning both stores.

use std::sync::Arc;
use std::time::Duration;

use super::{local_deadline, remote_deadline};
use crate::store::{LocalStore, RemoteStore};
use crate::util::unix_millis_now;

/// Computes the next identity that collides with nothing either store holds
/// for an owner.
///
/// Purely advisory: the caller persists the record under the returned id.
#[derive(Clone)]
pub struct IdCoordinator {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    call_timeout: Duration,
}

impl IdCoordinator {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            local,
            remote,
            call_timeout,
        }
    }

    /// `max(remote max id, local max id) + 1`.
    ///
    /// When either store cannot be read the current time in milliseconds is
    /// returned instead, so ids stay unique but are no longer sequential.
    pub async fn next_id(&self, owner_id: i64) -> i64 {
        let (remote, local) = tokio::join!(
            remote_deadline(self.call_timeout, self.remote.query_all(owner_id)),
            local_deadline(self.call_timeout, self.local.list(owner_id)),
        );

        match (remote, local) {
            (Ok(documents), Ok(records)) => {
                let remote_max = documents
                    .iter()
                    .filter_map(|document| document.id)
                    .max()
                    .unwrap_or(0);
                let local_max = records
                    .iter()
                    .filter_map(crate::models::Record::identity)
                    .max()
                    .unwrap_or(0);
                remote_max.max(local_max) + 1
            }
            (remote, local) => {
                let fallback = unix_millis_now();
                tracing::warn!(
                    owner_id,
                    fallback,
                    remote_error = ?remote.err().map(|error| error.to_string()),
                    local_error = ?local.err().map(|error| error.to_string()),
                    "Could not read max ids; falling back to time-based id"
                );
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Record, RemoteDocument};
    use crate::store::{LocalRecordStore, MemoryRemoteStore};
    use rust_decimal::Decimal;

    async fn stores() -> (Arc<LocalRecordStore>, Arc<MemoryRemoteStore>) {
        (
            Arc::new(LocalRecordStore::open_in_memory().await.unwrap()),
            Arc::new(MemoryRemoteStore::new()),
        )
    }

    fn remote_doc(id: i64) -> RemoteDocument {
        RemoteDocument {
            id: Some(id),
            owner_id: Some(1),
            amount: Some(Decimal::ONE),
            description: Some(format!("remote {id}")),
            occurred_at: Some(id),
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn next_id_exceeds_both_stores() {
        let (local, remote) = stores().await;
        let mut record = Record::new(1, Decimal::ONE, "local seven");
        record.id = Some(7);
        local.upsert(&record).await.unwrap();
        remote.seed(remote_doc(12));

        let coordinator = IdCoordinator::new(local, remote, Duration::from_secs(1));
        assert_eq!(coordinator.next_id(1).await, 13);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn next_id_starts_at_one_for_new_owner() {
        let (local, remote) = stores().await;
        let coordinator = IdCoordinator::new(local, remote, Duration::from_secs(1));
        assert_eq!(coordinator.next_id(42).await, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_remote_falls_back_to_time() {
        let (local, remote) = stores().await;
        remote.set_reachable(false);

        let before = unix_millis_now();
        let coordinator = IdCoordinator::new(local, remote, Duration::from_secs(1));
        let id = coordinator.next_id(1).await;
        assert!(id >= before);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_remote_falls_back_after_deadline() {
        let (local, remote) = stores().await;
        remote.set_latency(Duration::from_millis(500));

        let coordinator = IdCoordinator::new(local, remote, Duration::from_millis(20));
        assert!(coordinator.next_id(1).await > 1_000_000);
    }
}
