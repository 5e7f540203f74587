//! Sync conflict model

use serde::{Deserialize, Serialize};

/// Recorded sync conflict resolved by strategy (e.g., LWW)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Owner of the record involved in the conflict
    pub owner_id: i64,
    /// Record involved in the conflict
    pub record_id: i64,
    /// Stored row's `modified_at` when the conflict occurred
    pub local_modified_at: i64,
    /// Incoming row's `modified_at` that was rejected
    pub incoming_modified_at: i64,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy name
    pub strategy: String,
}
