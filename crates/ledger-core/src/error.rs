//! Error types for ledger-core

use thiserror::Error;

use crate::store::RemoteError;

/// Result type alias using ledger-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ledger-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The reconciliation engine was closed
    #[error("Reconciliation engine is closed")]
    Closed,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A pulled document is missing required fields
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// An update older than the stored row was ignored
    #[error("Ignored stale write to record {owner_id}:{id} (modified_at {modified_at})")]
    StaleWrite {
        owner_id: i64,
        id: i64,
        modified_at: i64,
    },

    /// Remote document store error
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
