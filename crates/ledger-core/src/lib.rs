//! ledger-core - Core library for Ledger
//!
//! Records, the local libSQL store, remote document stores and the
//! reconciliation engine that keeps them in agreement across devices.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use config::{RemoteConfig, SyncConfig, SyncSettings};
pub use error::{Error, Result};
pub use models::{Installment, Record, RemoteDocument, SyncConflict};
pub use state::SyncPhase;
pub use store::{
    IdentityProvider, LocalRecordStore, LocalStore, MemoryRemoteStore, OwnerSession,
    RemoteError, RemoteStore, RestRemoteStore,
};
pub use sync::{
    ReconciliationEngine, SaveOutcome, SkipReason, SyncKind, SyncReport, SyncScheduler,
};
