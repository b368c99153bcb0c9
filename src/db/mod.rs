//! Database module for domain records, conversation state and metrics

pub mod conversation;
pub mod embedding;
pub mod finance;
pub mod fitness;
pub mod inbox;
pub mod metrics;
pub mod project;
pub mod reminder;
mod schema;
pub mod task;

use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::{Error, Result};

pub use conversation::{ConversationRepo, HistoryEntry};
pub use embedding::{EmbeddingRecord, EmbeddingRepo};
pub use finance::{Debt, DebtStatus, FinanceRepo, Transaction, TransactionCategory, TransactionType};
pub use fitness::{
    FitnessRepo, MealType, NutritionCategory, NutritionEntry, WorkoutEntry, WorkoutFeeling,
    WorkoutType,
};
pub use inbox::{InboxItem, InboxRepo, InboxStatus, Note, NoteKind};
pub use metrics::{JobRun, MetricsRepo};
pub use project::{Project, ProjectRepo, ProjectStatus, ProjectType};
pub use reminder::{MAX_SNOOZE_MINUTES, MAX_SNOOZES, Reminder, ReminderRepo, ReminderStatus};
pub use schema::SCHEMA_VERSION;
pub use task::{NewTask, Task, TaskFilter, TaskPriority, TaskRepo, TaskStatus};

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled database connection
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Initialize the database
///
/// # Errors
///
/// Returns error if database cannot be opened or initialized
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(path)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;"));
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    // Run migrations on first connection
    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;

    tracing::info!(version = SCHEMA_VERSION, "database initialized");
    Ok(pool)
}

/// Initialize an in-memory database (for testing)
///
/// # Errors
///
/// Returns error if database cannot be initialized
pub fn init_memory() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;

    Ok(pool)
}

/// Check out a connection, mapping pool errors
pub(crate) fn conn(pool: &DbPool) -> Result<DbConn> {
    pool.get().map_err(|e| Error::Database(e.to_string()))
}

/// Format a timestamp for storage
///
/// Always UTC with fixed nanosecond precision and a `Z` suffix, so stored values
/// compare correctly as text.
#[must_use]
pub fn timestamp<Tz: chrono::TimeZone>(dt: &DateTime<Tz>) -> String {
    dt.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse an optional stored timestamp
pub(crate) fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a stored `YYYY-MM-DD` date
pub(crate) fn parse_date_opt(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok())
}

/// Generate a new record identifier
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_memory() {
        let pool = init_memory().unwrap();
        let _conn = pool.get().unwrap();
    }

    #[test]
    fn test_init_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("command.db");
        let pool = init(&path).unwrap();
        drop(pool);
        assert!(path.exists());
    }

    #[test]
    fn timestamps_sort_as_text() {
        let early = DateTime::parse_from_rfc3339("2026-01-01T08:00:00-06:00").unwrap();
        let late = DateTime::parse_from_rfc3339("2026-01-01T15:00:00+00:00").unwrap();
        assert!(timestamp(&early) < timestamp(&late));
        assert_eq!(timestamp(&early), "2026-01-01T14:00:00.000000000Z");
    }

    #[test]
    fn timestamps_keep_sub_second_precision() {
        let precise = DateTime::parse_from_rfc3339("2026-01-01T08:00:00.123456789-06:00")
            .unwrap()
            .with_timezone(&Utc);
        let stored = timestamp(&precise);
        assert_eq!(stored, "2026-01-01T14:00:00.123456789Z");
        assert_eq!(parse_datetime(&stored), precise);

        let later = precise + chrono::Duration::nanoseconds(1);
        assert!(stored < timestamp(&later));
    }
}
