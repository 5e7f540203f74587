//! Versioned schema for the local record store

use crate::error::Result;
use libsql::Connection;

/// One schema step; applied atomically together with its version row
struct Migration {
    version: i32,
    name: &'static str,
    statements: &'static [&'static str],
}

const RECORDS_TABLE: Migration = Migration {
    version: 1,
    name: "records table",
    statements: &[
        "CREATE TABLE IF NOT EXISTS records (
            owner_id INTEGER NOT NULL,
            id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            description TEXT NOT NULL,
            occurred_at INTEGER NOT NULL,
            modified_at INTEGER NOT NULL,
            category_id INTEGER,
            installment_number INTEGER,
            installment_total INTEGER,
            PRIMARY KEY (owner_id, id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_records_occurred
            ON records(owner_id, occurred_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_records_modified
            ON records(owner_id, modified_at DESC)",
    ],
};

// Older writes are dropped by the trigger and logged instead of applied.
const LWW_GUARD: Migration = Migration {
    version: 2,
    name: "last-write-wins guard",
    statements: &[
        "CREATE TABLE IF NOT EXISTS sync_conflicts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            record_id INTEGER NOT NULL,
            local_modified_at INTEGER NOT NULL,
            incoming_modified_at INTEGER NOT NULL,
            resolved_at INTEGER NOT NULL,
            strategy TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_record
            ON sync_conflicts(owner_id, record_id)",
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_resolved
            ON sync_conflicts(resolved_at DESC)",
        "CREATE TRIGGER IF NOT EXISTS records_lww_conflict_guard BEFORE UPDATE ON records
         FOR EACH ROW
         WHEN NEW.modified_at < OLD.modified_at
         BEGIN
             INSERT INTO sync_conflicts (
                 owner_id, record_id, local_modified_at, incoming_modified_at,
                 resolved_at, strategy
             ) VALUES (
                 OLD.owner_id, OLD.id, OLD.modified_at, NEW.modified_at,
                 CAST(strftime('%s', 'now') AS INTEGER) * 1000, 'lww'
             );
             SELECT RAISE(IGNORE);
         END",
    ],
};

const MIGRATIONS: &[Migration] = &[RECORDS_TABLE, LWW_GUARD];

/// Bring the schema up to the latest version
pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
        (),
    )
    .await?;

    let current = schema_version(conn).await?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration).await?;
        tracing::info!(
            version = migration.version,
            "Applied local schema migration: {}",
            migration.name
        );
    }
    Ok(())
}

async fn schema_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

async fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute("BEGIN", ()).await?;

    let outcome = async {
        for statement in migration.statements {
            conn.execute(statement, ()).await?;
        }
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            libsql::params![migration.version],
        )
        .await?;
        conn.execute("COMMIT", ()).await?;
        Ok::<_, libsql::Error>(())
    }
    .await;

    if let Err(error) = outcome {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error.into());
    }
    Ok(())
}
