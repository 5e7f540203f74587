//! In-process remote document store.
//!
//! Behaves like the shared collection: server-assigned monotonic
//! `modified_at`, upsert by composite key, an index that may not be ready yet.
//! Used for offline runs and for exercising the engine against failures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::models::{document_key, RemoteDocument};
use crate::util::unix_millis_now;

#[derive(Default)]
struct Collection {
    documents: BTreeMap<String, RemoteDocument>,
    clock: i64,
    legacy_seq: u64,
}

impl Collection {
    fn tick(&mut self) -> i64 {
        self.clock = unix_millis_now().max(self.clock + 1);
        self.clock
    }
}

/// Remote store held entirely in memory
pub struct MemoryRemoteStore {
    collection: Mutex<Collection>,
    reachable: AtomicBool,
    index_ready: AtomicBool,
    latency: Mutex<Duration>,
    upserts: AtomicUsize,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    /// An empty, reachable collection with its index ready
    #[must_use]
    pub fn new() -> Self {
        Self {
            collection: Mutex::new(Collection::default()),
            reachable: AtomicBool::new(true),
            index_ready: AtomicBool::new(true),
            latency: Mutex::new(Duration::ZERO),
            upserts: AtomicUsize::new(0),
        }
    }

    /// Insert a document as another device or an older client would have
    /// written it. Documents without an id are stored under a generated key.
    /// An absent `modified_at` is stamped by the collection clock.
    pub fn seed(&self, mut document: RemoteDocument) {
        let mut collection = self.collection.lock();
        let modified_at = match document.modified_at {
            Some(modified_at) => {
                collection.clock = collection.clock.max(modified_at);
                modified_at
            }
            None => collection.tick(),
        };
        document.modified_at = Some(modified_at);

        let key = match (document.owner_id, document.id.filter(|id| *id != 0)) {
            (Some(owner_id), Some(id)) => document_key(owner_id, id),
            _ => {
                collection.legacy_seq += 1;
                format!("legacy-{}", collection.legacy_seq)
            }
        };
        collection.documents.insert(key, document);
    }

    /// Every document of an owner, in key order
    pub fn documents(&self, owner_id: i64) -> Vec<RemoteDocument> {
        self.collection
            .lock()
            .documents
            .values()
            .filter(|document| document.owner_id == Some(owner_id))
            .cloned()
            .collect()
    }

    /// Number of upserts served so far
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Simulate losing or regaining connectivity
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Simulate the modified-since index being built or dropped
    pub fn set_index_ready(&self, ready: bool) {
        self.index_ready.store(ready, Ordering::SeqCst);
    }

    /// Delay applied to every call
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    async fn round_trip(&self) -> RemoteResult<()> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unreachable("memory store offline".to_string()))
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn query_all(&self, owner_id: i64) -> RemoteResult<Vec<RemoteDocument>> {
        self.round_trip().await?;
        Ok(self.documents(owner_id))
    }

    async fn query_modified_since(
        &self,
        owner_id: i64,
        since: i64,
    ) -> RemoteResult<Vec<RemoteDocument>> {
        self.round_trip().await?;
        if !self.index_ready.load(Ordering::SeqCst) {
            return Err(RemoteError::IndexUnavailable(
                "owner_id, modified_at index is still building".to_string(),
            ));
        }

        let mut documents: Vec<RemoteDocument> = self
            .documents(owner_id)
            .into_iter()
            .filter(|document| document.modified_at.unwrap_or(0) >= since)
            .collect();
        documents.sort_by_key(|document| document.modified_at);
        Ok(documents)
    }

    async fn upsert(&self, owner_id: i64, id: i64, document: &RemoteDocument) -> RemoteResult<()> {
        self.round_trip().await?;

        let mut stored = document.clone();
        stored.owner_id = Some(owner_id);
        stored.id = Some(id);

        let mut collection = self.collection.lock();
        stored.modified_at = Some(collection.tick());
        collection
            .documents
            .insert(document_key(owner_id, id), stored);
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, owner_id: i64, id: i64) -> RemoteResult<()> {
        self.round_trip().await?;
        self.collection
            .lock()
            .documents
            .remove(&document_key(owner_id, id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn taxi(id: Option<i64>) -> RemoteDocument {
        RemoteDocument {
            id,
            owner_id: Some(1),
            amount: Some(Decimal::new(8, 0)),
            description: Some("Taxi".to_string()),
            occurred_at: Some(1_700_000_000_000),
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_is_keyed_by_owner_and_id() {
        let store = MemoryRemoteStore::new();
        store.upsert(1, 2, &taxi(None)).await.unwrap();
        store.upsert(1, 2, &taxi(None)).await.unwrap();

        let documents = store.query_all(1).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, Some(2));
        assert_eq!(store.upsert_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn modified_at_is_server_assigned_and_monotonic() {
        let store = MemoryRemoteStore::new();
        store.upsert(1, 1, &taxi(None)).await.unwrap();
        let first = store.documents(1)[0].modified_at.unwrap();
        store.upsert(1, 1, &taxi(None)).await.unwrap();
        let second = store.documents(1)[0].modified_at.unwrap();
        assert!(second > first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn legacy_documents_without_id_get_distinct_keys() {
        let store = MemoryRemoteStore::new();
        store.seed(taxi(None));
        store.seed(taxi(Some(0)));
        assert_eq!(store.query_all(1).await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn modified_since_requires_index() {
        let store = MemoryRemoteStore::new();
        store.seed(taxi(Some(1)));
        store.set_index_ready(false);

        let error = store.query_modified_since(1, 0).await.unwrap_err();
        assert!(matches!(error, RemoteError::IndexUnavailable(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn modified_since_filters_old_documents() {
        let store = MemoryRemoteStore::new();
        let mut old = taxi(Some(1));
        old.modified_at = Some(1_000);
        store.seed(old);
        store.upsert(1, 2, &taxi(None)).await.unwrap();

        let recent = store.query_modified_since(1, 2_000).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, Some(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_store_rejects_calls() {
        let store = MemoryRemoteStore::new();
        store.set_reachable(false);
        let error = store.delete(1, 1).await.unwrap_err();
        assert!(error.is_connectivity());
    }
}
