//! Data models for Ledger

mod document;
mod record;
mod sync_conflict;

pub use document::{document_key, RemoteDocument};
pub use record::{ContentKey, Installment, Record};
pub use sync_conflict::SyncConflict;
