//! libSQL-backed local record store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::LocalStore;
use crate::db::{Database, LibSqlRecordRepository, RecordRepository};
use crate::models::{Record, SyncConflict};
use crate::Result;

/// Thread-safe local store over a single libSQL connection.
#[derive(Clone)]
pub struct LocalRecordStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalRecordStore {
    /// Open the store at the given filesystem path, creating parent directories.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        tracing::debug!("Opening local record store at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Highest id stored for the owner.
    pub async fn max_id(&self, owner_id: i64) -> Result<i64> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.max_id(owner_id).await
    }

    /// List recently resolved sync conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.list_conflicts(limit).await
    }
}

#[async_trait]
impl LocalStore for LocalRecordStore {
    async fn list(&self, owner_id: i64) -> Result<Vec<Record>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.list(owner_id).await
    }

    async fn get(&self, owner_id: i64, id: i64) -> Result<Option<Record>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.get(owner_id, id).await
    }

    async fn upsert(&self, record: &Record) -> Result<i64> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.upsert(record).await
    }

    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.delete(owner_id, id).await
    }
}
