//! Database layer for Ledger

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{LibSqlRecordRepository, RecordRepository};
