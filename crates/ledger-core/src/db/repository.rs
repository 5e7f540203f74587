//! Record repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use std::str::FromStr;

use libsql::{Connection, Row, Value};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::models::{Installment, Record, SyncConflict};

const RECORD_COLUMNS: &str = "owner_id, id, amount, description, occurred_at, modified_at, \
     category_id, installment_number, installment_total";

/// Trait for record storage operations
#[allow(async_fn_in_trait)]
pub trait RecordRepository {
    /// List every record of an owner, most recent occurrence first
    async fn list(&self, owner_id: i64) -> Result<Vec<Record>>;

    /// Get a record by owner-scoped id
    async fn get(&self, owner_id: i64, id: i64) -> Result<Option<Record>>;

    /// Insert or update a record, assigning the next local id when absent.
    ///
    /// Updates carrying an older `modified_at` than the stored row are
    /// logged as sync conflicts and fail with [`Error::StaleWrite`].
    async fn upsert(&self, record: &Record) -> Result<i64>;

    /// Delete a record; returns whether a row was removed
    async fn delete(&self, owner_id: i64, id: i64) -> Result<bool>;

    /// Highest id stored for an owner, 0 when empty
    async fn max_id(&self, owner_id: i64) -> Result<i64>;

    /// Most recently resolved sync conflicts
    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>>;
}

/// libSQL implementation of `RecordRepository`
pub struct LibSqlRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a record from a database row
    fn parse_record(row: &Row) -> Result<Record> {
        let amount_text: String = row.get(2)?;
        let amount = Decimal::from_str(&amount_text).map_err(|error| {
            Error::Database(format!("invalid stored amount '{amount_text}': {error}"))
        })?;

        let installment = match (optional_int(row, 7)?, optional_int(row, 8)?) {
            (Some(number), Some(total)) => Some(Installment {
                number: stored_u32(number, "installment_number")?,
                total: stored_u32(total, "installment_total")?,
            }),
            _ => None,
        };

        Ok(Record {
            owner_id: row.get(0)?,
            id: Some(row.get(1)?),
            amount,
            description: row.get(3)?,
            occurred_at: row.get(4)?,
            modified_at: row.get(5)?,
            category_id: optional_int(row, 6)?,
            installment,
        })
    }

    async fn collect_records(mut rows: libsql::Rows) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_record(&row)?);
        }
        Ok(records)
    }
}

fn optional_int(row: &Row, index: i32) -> Result<Option<i64>> {
    match row.get_value(index)? {
        Value::Integer(value) => Ok(Some(value)),
        Value::Null => Ok(None),
        other => Err(Error::Database(format!(
            "unexpected value in column {index}: {other:?}"
        ))),
    }
}

fn stored_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::Database(format!("invalid stored {column} '{value}'")))
}

fn optional_value(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

impl RecordRepository for LibSqlRecordRepository<'_> {
    async fn list(&self, owner_id: i64) -> Result<Vec<Record>> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM records
                     WHERE owner_id = ?1
                     ORDER BY occurred_at DESC, id DESC"
                ),
                vec![Value::Integer(owner_id)],
            )
            .await?;
        Self::collect_records(rows).await
    }

    async fn get(&self, owner_id: i64, id: i64) -> Result<Option<Record>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE owner_id = ?1 AND id = ?2"),
                vec![Value::Integer(owner_id), Value::Integer(id)],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, record: &Record) -> Result<i64> {
        if record.description.trim().is_empty() {
            return Err(Error::InvalidInput(
                "record description cannot be empty".to_string(),
            ));
        }

        let id = match record.identity() {
            Some(id) => id,
            None => self.max_id(record.owner_id).await? + 1,
        };

        let written = self
            .conn
            .execute(
                &format!(
                    "INSERT INTO records ({RECORD_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(owner_id, id) DO UPDATE SET
                         amount = excluded.amount,
                         description = excluded.description,
                         occurred_at = excluded.occurred_at,
                         modified_at = excluded.modified_at,
                         category_id = excluded.category_id,
                         installment_number = excluded.installment_number,
                         installment_total = excluded.installment_total"
                ),
                vec![
                    Value::Integer(record.owner_id),
                    Value::Integer(id),
                    Value::Text(record.amount.normalize().to_string()),
                    Value::Text(record.description.clone()),
                    Value::Integer(record.occurred_at),
                    Value::Integer(record.modified_at),
                    optional_value(record.category_id),
                    optional_value(record.installment.map(|plan| i64::from(plan.number))),
                    optional_value(record.installment.map(|plan| i64::from(plan.total))),
                ],
            )
            .await?;

        // The LWW trigger drops older updates without failing the statement
        if written == 0 {
            return Err(Error::StaleWrite {
                owner_id: record.owner_id,
                id,
                modified_at: record.modified_at,
            });
        }
        Ok(id)
    }

    async fn delete(&self, owner_id: i64, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM records WHERE owner_id = ?1 AND id = ?2",
                vec![Value::Integer(owner_id), Value::Integer(id)],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn max_id(&self, owner_id: i64) -> Result<i64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COALESCE(MAX(id), 0) FROM records WHERE owner_id = ?1",
                vec![Value::Integer(owner_id)],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, owner_id, record_id, local_modified_at, incoming_modified_at,
                        resolved_at, strategy
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?1",
                vec![Value::Integer(limit as i64)],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            conflicts.push(SyncConflict {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                record_id: row.get(2)?,
                local_modified_at: row.get(3)?,
                incoming_modified_at: row.get(4)?,
                resolved_at: row.get(5)?,
                strategy: row.get(6)?,
            });
        }
        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn lunch() -> Record {
        Record::new(1, Decimal::new(1000, 2), "Lunch").occurred_at(1_700_000_000_000)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_assigns_next_id() {
        let db = setup().await;
        let repo = LibSqlRecordRepository::new(db.connection());

        let first = repo.upsert(&lunch()).await.unwrap();
        let second = repo.upsert(&lunch()).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(repo.max_id(1).await.unwrap(), 2);
        assert_eq!(repo.max_id(2).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_and_get_roundtrip() {
        let db = setup().await;
        let repo = LibSqlRecordRepository::new(db.connection());

        let mut record = lunch().with_category(3).with_installment(Installment {
            number: 1,
            total: 3,
        });
        record.id = Some(7);
        repo.upsert(&record).await.unwrap();

        let fetched = repo.get(1, 7).await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_is_owner_scoped() {
        let db = setup().await;
        let repo = LibSqlRecordRepository::new(db.connection());

        repo.upsert(&lunch()).await.unwrap();
        repo.upsert(&Record::new(2, Decimal::ONE, "Other owner"))
            .await
            .unwrap();

        let records = repo.list(1).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "Lunch");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete() {
        let db = setup().await;
        let repo = LibSqlRecordRepository::new(db.connection());

        let id = repo.upsert(&lunch()).await.unwrap();
        assert!(repo.delete(1, id).await.unwrap());
        assert!(!repo.delete(1, id).await.unwrap());
        assert!(repo.get(1, id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_description_rejected() {
        let db = setup().await;
        let repo = LibSqlRecordRepository::new(db.connection());

        let error = repo
            .upsert(&Record::new(1, Decimal::ONE, "  "))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_older_write_is_ignored_and_logged() {
        let db = setup().await;
        let repo = LibSqlRecordRepository::new(db.connection());

        let mut record = lunch();
        record.id = Some(1);
        record.modified_at = 2_000;
        repo.upsert(&record).await.unwrap();

        let mut stale = record.clone();
        stale.description = "Stale lunch".to_string();
        stale.modified_at = 1_000;
        let error = repo.upsert(&stale).await.unwrap_err();
        assert!(matches!(
            error,
            Error::StaleWrite {
                owner_id: 1,
                id: 1,
                modified_at: 1_000
            }
        ));

        let stored = repo.get(1, 1).await.unwrap().unwrap();
        assert_eq!(stored.description, "Lunch");

        let conflicts = repo.list_conflicts(10).await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].record_id, 1);
        assert_eq!(conflicts[0].local_modified_at, 2_000);
        assert_eq!(conflicts[0].incoming_modified_at, 1_000);
        assert_eq!(conflicts[0].strategy, "lww");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_same_clock_rewrite_is_applied() {
        let db = setup().await;
        let repo = LibSqlRecordRepository::new(db.connection());

        let mut record = lunch();
        record.id = Some(1);
        repo.upsert(&record).await.unwrap();
        record.description = "Team lunch".to_string();
        repo.upsert(&record).await.unwrap();

        assert_eq!(repo.get(1, 1).await.unwrap().unwrap().description, "Team lunch");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_corrupt_installment_is_an_error() {
        let db = setup().await;
        let repo = LibSqlRecordRepository::new(db.connection());

        db.connection()
            .execute(
                "INSERT INTO records (owner_id, id, amount, description, occurred_at,
                     modified_at, installment_number, installment_total)
                 VALUES (1, 3, '10', 'Sofa', 1000, 1000, -1, 12)",
                (),
            )
            .await
            .unwrap();

        let error = repo.get(1, 3).await.unwrap_err();
        assert!(matches!(
            error,
            Error::Database(message) if message.contains("installment_number")
        ));
    }
}
