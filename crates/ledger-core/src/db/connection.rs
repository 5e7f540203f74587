//! libSQL connection for the local record store

use std::path::Path;

use libsql::{Builder, Connection, Database as LibSqlDatabase};

use super::migrations;
use crate::error::Result;

/// Best-effort tuning; some of these are no-ops for `:memory:`
const PRAGMAS: &[&str] = &[
    "PRAGMA journal_mode = WAL",
    "PRAGMA synchronous = NORMAL",
    "PRAGMA busy_timeout = 5000",
];

/// An open, migrated local database
pub struct Database {
    // Keeps the underlying database alive for the connection
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open or create the database file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Builder::new_local(path).build().await?;
        Self::prepare(db).await
    }

    /// Open a private in-memory database
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::prepare(db).await
    }

    async fn prepare(db: LibSqlDatabase) -> Result<Self> {
        let conn = db.connect()?;
        for pragma in PRAGMAS {
            // PRAGMA statements may return a row, so query rather than execute
            if let Err(error) = conn.query(pragma, ()).await {
                tracing::debug!("Ignoring failed {}: {}", pragma, error);
            }
        }
        migrations::run(&conn).await?;
        Ok(Self { _db: db, conn })
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_database_has_records_table() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM records", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_creates_missing_directories() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("ledger.db");

        let _db = Database::open(&db_path).await.unwrap();
        assert!(db_path.exists());
    }
}
