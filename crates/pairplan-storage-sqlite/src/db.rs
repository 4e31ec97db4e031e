use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};

use pairplan_core::{PairError, PairResult};

/// Open a pool on `url` and bring the schema up to date.
///
/// Every store in this crate can share the returned pool.
pub async fn connect_pool(url: &str) -> PairResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(storage_err)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(options)
        .await
        .map_err(storage_err)?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| PairError::Storage(e.to_string()))?;

    Ok(pool)
}

pub(crate) fn storage_err(e: sqlx::Error) -> PairError {
    PairError::Storage(e.to_string())
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Timestamps are stored as fixed-width RFC 3339 text so that string order
/// equals time order inside SQL comparisons.
pub(crate) fn format_datetime(dt: &chrono::DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse a SQLite datetime text string into a chrono DateTime<Utc>.
pub(crate) fn parse_datetime(s: &str) -> PairResult<chrono::DateTime<Utc>> {
    // Try RFC 3339 first (handles the trailing Z)
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Fallback: parse as NaiveDateTime with milliseconds
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(PairError::Storage(format!("failed to parse datetime: {s}")))
}
