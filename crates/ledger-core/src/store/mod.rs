//! Collaborator contracts consumed by the reconciliation engine.
//!
//! The engine never talks to a database or HTTP client directly. It sees a
//! [`LocalStore`] (offline-capable, per-device), a [`RemoteStore`] (shared
//! document collection) and an [`IdentityProvider`] that gates every sync on a
//! resolved owner.

mod local;
mod memory;
mod rest;
mod session;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::Result;
use crate::models::{Record, RemoteDocument};

pub use local::LocalRecordStore;
pub use memory::MemoryRemoteStore;
pub use rest::RestRemoteStore;
pub use session::OwnerSession;

/// Errors raised by a remote document store
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote store could not be reached
    #[error("Remote store unreachable: {0}")]
    Unreachable(String),
    /// A call exceeded its deadline
    #[error("Remote call timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The modified-since query needs a server-side index that is not ready
    #[error("Remote index not available: {0}")]
    IndexUnavailable(String),
    /// The remote store rejected the request
    #[error("Remote API error: {0}")]
    Api(String),
    /// Transport-level HTTP failure
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The response body could not be decoded
    #[error("Invalid remote payload: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether the failure means the remote is not reachable right now.
    ///
    /// A pass stops issuing further calls after a connectivity failure.
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }
}

/// Result type for remote store calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Persistent, per-device record store
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Every record of the owner
    async fn list(&self, owner_id: i64) -> Result<Vec<Record>>;

    /// One record by owner-scoped id
    async fn get(&self, owner_id: i64, id: i64) -> Result<Option<Record>>;

    /// Insert or update a record, returning its id.
    ///
    /// An update older than the stored row fails with [`crate::Error::StaleWrite`].
    async fn upsert(&self, record: &Record) -> Result<i64>;

    /// Delete a record; returns whether it existed
    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool>;
}

/// Shared document collection queried by owner and modification time
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every document of the owner
    async fn query_all(&self, owner_id: i64) -> RemoteResult<Vec<RemoteDocument>>;

    /// Documents of the owner modified at or after `since` (Unix ms)
    async fn query_modified_since(
        &self,
        owner_id: i64,
        since: i64,
    ) -> RemoteResult<Vec<RemoteDocument>>;

    /// Insert or replace the document keyed by `(owner_id, id)`
    async fn upsert(&self, owner_id: i64, id: i64, document: &RemoteDocument) -> RemoteResult<()>;

    /// Delete the document keyed by `(owner_id, id)`
    async fn delete(&self, owner_id: i64, id: i64) -> RemoteResult<()>;
}

/// Source of the currently signed-in owner
pub trait IdentityProvider: Send + Sync {
    /// The resolved owner, or `None` when nobody is signed in
    fn current_owner_id(&self) -> Option<i64>;
}
