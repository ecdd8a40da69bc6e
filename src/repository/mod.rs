//! Repository layer for SQLite persistence.
//!
//! The harvest tracking store is the system of record: every mutation is
//! keyed by case number, attempt counts never decrease, and values are
//! coalesced over old ones rather than clobbered with nulls.

mod docket;
pub mod harvest;

pub use docket::DocketRepository;
pub use harvest::HarvestRepository;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

/// Errors from the repository layer.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid stored value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Open a connection with the pragmas every repository expects.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(10))?;
    Ok(conn)
}

/// Convert a `QueryReturnedNoRows` error into `None`.
pub(crate) fn to_option<T>(
    result: std::result::Result<T, rusqlite::Error>,
) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
