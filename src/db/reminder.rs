//! Reminder repository

use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use super::{DbPool, TaskPriority, conn, new_id, parse_datetime, parse_datetime_opt, timestamp};
use crate::cache::{CacheScope, QueryCache};
use crate::{Error, Result};

/// How many times a reminder may be snoozed
pub const MAX_SNOOZES: u32 = 3;

/// Longest single snooze, one day
pub const MAX_SNOOZE_MINUTES: i64 = 24 * 60;

/// Reminder delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Snoozed,
    Cancelled,
}

impl ReminderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Snoozed => "snoozed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Still waiting to be delivered
    #[must_use]
    pub const fn is_waiting(self) -> bool {
        matches!(self, Self::Pending | Self::Snoozed)
    }
}

impl FromStr for ReminderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "snoozed" => Ok(Self::Snoozed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::Validation(format!("unknown reminder status: {other}"))),
        }
    }
}

/// A scheduled reminder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reminder {
    pub id: String,
    pub chat_id: i64,
    pub message: String,
    pub remind_at: DateTime<Utc>,
    pub status: ReminderStatus,
    pub priority: TaskPriority,
    pub task_id: Option<String>,
    pub snooze_count: u32,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    /// Whether the dispatcher should deliver this reminder at `now`
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_waiting() && self.remind_at <= now
    }

    #[must_use]
    pub const fn can_snooze(&self) -> bool {
        self.snooze_count < MAX_SNOOZES
    }
}

const REMINDER_COLUMNS: &str = "id, chat_id, message, remind_at, status, priority, task_id, \
                                snooze_count, sent_at, created_at";

fn row_to_reminder(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    let status: String = row.get(4)?;
    let priority: String = row.get(5)?;
    Ok(Reminder {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        message: row.get(2)?,
        remind_at: parse_datetime(&row.get::<_, String>(3)?),
        status: status.parse().unwrap_or(ReminderStatus::Pending),
        priority: priority.parse().unwrap_or_default(),
        task_id: row.get(6)?,
        snooze_count: row.get(7)?,
        sent_at: parse_datetime_opt(row.get(8)?),
        created_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

/// Reminder repository
#[derive(Clone)]
pub struct ReminderRepo {
    pool: DbPool,
    cache: QueryCache,
}

impl ReminderRepo {
    /// Create a new reminder repository
    #[must_use]
    pub const fn new(pool: DbPool, cache: QueryCache) -> Self {
        Self { pool, cache }
    }

    /// Schedule a reminder
    ///
    /// # Errors
    ///
    /// Returns error if the message is empty or the insert fails
    pub fn create<Tz: TimeZone>(
        &self,
        chat_id: i64,
        message: &str,
        remind_at: &DateTime<Tz>,
        priority: TaskPriority,
        task_id: Option<&str>,
    ) -> Result<Reminder> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::Validation("reminder text is empty".to_string()));
        }

        let conn = conn(&self.pool)?;
        let id = new_id();
        conn.execute(
            "INSERT INTO reminders (id, chat_id, message, remind_at, status, priority, task_id, \
             created_at) VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7)",
            params![
                id,
                chat_id,
                message,
                timestamp(remind_at),
                priority.as_str(),
                task_id,
                timestamp(&Utc::now()),
            ],
        )?;
        drop(conn);
        self.cache.invalidate(CacheScope::Reminders);

        tracing::debug!(reminder_id = %id, chat_id, "reminder scheduled");
        self.require(&id)
    }

    /// Fetch a reminder by id
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn get(&self, id: &str) -> Result<Option<Reminder>> {
        let conn = conn(&self.pool)?;
        let reminder = conn
            .query_row(
                &format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1"),
                [id],
                row_to_reminder,
            )
            .optional()?;
        Ok(reminder)
    }

    fn require(&self, id: &str) -> Result<Reminder> {
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("reminder {id}")))
    }

    /// Reminders that are pending or snoozed with `remind_at <= now`
    ///
    /// Not cached; the dispatcher must always see the store.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders \
             WHERE status IN ('pending', 'snoozed') AND remind_at <= ?1 ORDER BY remind_at"
        ))?;
        let reminders = stmt
            .query_map([timestamp(&now)], row_to_reminder)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(reminders)
    }

    /// Waiting reminders scheduled in `[from, to)`
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let (from, to) = (timestamp(&from), timestamp(&to));
        let sig = format!("between|{from}|{to}");
        self.cache.get_or_load(CacheScope::Reminders, &sig, || {
            let conn = conn(&self.pool)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {REMINDER_COLUMNS} FROM reminders \
                 WHERE status IN ('pending', 'snoozed') AND remind_at >= ?1 AND remind_at < ?2 \
                 ORDER BY remind_at"
            ))?;
            let reminders = stmt
                .query_map([&from, &to], row_to_reminder)?
                .collect::<rusqlite::Result<_>>()?;
            Ok(reminders)
        })
    }

    /// Next waiting reminders for a chat
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn upcoming(&self, chat_id: i64, limit: usize) -> Result<Vec<Reminder>> {
        let sig = format!("upcoming|{chat_id}|{limit}");
        self.cache.get_or_load(CacheScope::Reminders, &sig, || {
            let conn = conn(&self.pool)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {REMINDER_COLUMNS} FROM reminders \
                 WHERE chat_id = ?1 AND status IN ('pending', 'snoozed') \
                 ORDER BY remind_at LIMIT {limit}"
            ))?;
            let reminders = stmt
                .query_map([chat_id], row_to_reminder)?
                .collect::<rusqlite::Result<_>>()?;
            Ok(reminders)
        })
    }

    /// Record delivery
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the reminder does not exist
    pub fn mark_sent(&self, id: &str, at: DateTime<Utc>) -> Result<Reminder> {
        let conn = conn(&self.pool)?;
        let changed = conn.execute(
            "UPDATE reminders SET status = 'sent', sent_at = ?1 WHERE id = ?2",
            params![timestamp(&at), id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("reminder {id}")));
        }
        drop(conn);
        self.cache.invalidate(CacheScope::Reminders);
        self.require(id)
    }

    /// Push a reminder `minutes` past `now`
    ///
    /// # Errors
    ///
    /// Returns `Validation` once the reminder has been snoozed
    /// [`MAX_SNOOZES`] times, or if it was cancelled
    pub fn snooze(&self, id: &str, minutes: i64, now: DateTime<Utc>) -> Result<Reminder> {
        let reminder = self.require(id)?;
        if reminder.status == ReminderStatus::Cancelled {
            return Err(Error::Validation("reminder was dismissed".to_string()));
        }
        if !reminder.can_snooze() {
            return Err(Error::Validation(format!(
                "reminder already snoozed {MAX_SNOOZES} times"
            )));
        }
        if !(1..=MAX_SNOOZE_MINUTES).contains(&minutes) {
            return Err(Error::Validation(format!(
                "snooze must be between 1 and {MAX_SNOOZE_MINUTES} minutes"
            )));
        }
        let remind_at = now
            .checked_add_signed(Duration::minutes(minutes))
            .ok_or_else(|| Error::Validation("snooze time out of range".to_string()))?;

        let conn = conn(&self.pool)?;
        conn.execute(
            "UPDATE reminders SET status = 'snoozed', remind_at = ?1, \
             snooze_count = snooze_count + 1 WHERE id = ?2",
            params![timestamp(&remind_at), id],
        )?;
        drop(conn);
        self.cache.invalidate(CacheScope::Reminders);
        self.require(id)
    }

    /// Dismiss a reminder
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the reminder does not exist
    pub fn cancel(&self, id: &str) -> Result<Reminder> {
        let conn = conn(&self.pool)?;
        let changed = conn.execute(
            "UPDATE reminders SET status = 'cancelled' WHERE id = ?1",
            [id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("reminder {id}")));
        }
        drop(conn);
        self.cache.invalidate(CacheScope::Reminders);
        self.require(id)
    }
}
