//! Inbox captures plus ideas and notes

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use super::{DbPool, conn, new_id, parse_datetime, parse_datetime_opt, timestamp};
use crate::cache::{CacheScope, QueryCache};
use crate::{Error, Result};

/// Inbox item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    Pending,
    Processed,
    Archived,
}

impl InboxStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Archived => "archived",
        }
    }
}

impl FromStr for InboxStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processed" => Ok(Self::Processed),
            "archived" => Ok(Self::Archived),
            other => Err(Error::Validation(format!("unknown inbox status: {other}"))),
        }
    }
}

/// An unclassified capture awaiting review
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxItem {
    pub id: String,
    pub content: String,
    pub source: String,
    pub status: InboxStatus,
    pub notes: Option<String>,
    pub classified_as: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Kind of free-form note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Idea,
    Note,
}

impl NoteKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idea => "idea",
            Self::Note => "note",
        }
    }
}

/// A stored idea or note
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub id: String,
    pub kind: NoteKind,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<InboxItem> {
    let status: String = row.get(3)?;
    Ok(InboxItem {
        id: row.get(0)?,
        content: row.get(1)?,
        source: row.get(2)?,
        status: status.parse().unwrap_or(InboxStatus::Pending),
        notes: row.get(4)?,
        classified_as: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        processed_at: parse_datetime_opt(row.get(7)?),
    })
}

fn row_to_note(row: &Row<'_>) -> rusqlite::Result<Note> {
    let kind: String = row.get(1)?;
    Ok(Note {
        id: row.get(0)?,
        kind: if kind == "idea" { NoteKind::Idea } else { NoteKind::Note },
        title: row.get(2)?,
        content: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

/// Notes get a short title from their first line
fn note_title(content: &str) -> String {
    let first = content.lines().next().unwrap_or_default().trim();
    if first.chars().count() > 60 {
        let mut title: String = first.chars().take(57).collect();
        title.push_str("...");
        title
    } else {
        first.to_string()
    }
}

/// Inbox and notes repository
#[derive(Clone)]
pub struct InboxRepo {
    pool: DbPool,
    cache: QueryCache,
}

impl InboxRepo {
    /// Create a new inbox repository
    #[must_use]
    pub const fn new(pool: DbPool, cache: QueryCache) -> Self {
        Self { pool, cache }
    }

    /// Store a capture for manual review
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails
    pub fn capture(&self, content: &str, source: &str, notes: Option<&str>) -> Result<InboxItem> {
        let conn = conn(&self.pool)?;
        let id = new_id();
        conn.execute(
            "INSERT INTO inbox (id, content, source, status, notes, created_at) \
             VALUES (?1, ?2, ?3, 'pending', ?4, ?5)",
            params![id, content, source, notes, timestamp(&Utc::now())],
        )?;
        drop(conn);
        self.cache.invalidate(CacheScope::Inbox);
        self.get(&id)?
            .ok_or_else(|| Error::NotFound(format!("inbox item {id}")))
    }

    /// Fetch an inbox item
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn get(&self, id: &str) -> Result<Option<InboxItem>> {
        let conn = conn(&self.pool)?;
        let item = conn
            .query_row(
                "SELECT id, content, source, status, notes, classified_as, created_at, \
                 processed_at FROM inbox WHERE id = ?1",
                [id],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    /// Pending items, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn pending(&self, limit: usize) -> Result<Vec<InboxItem>> {
        self.cache
            .get_or_load(CacheScope::Inbox, &format!("pending|{limit}"), || {
                let conn = conn(&self.pool)?;
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, content, source, status, notes, classified_as, created_at, \
                     processed_at FROM inbox WHERE status = 'pending' \
                     ORDER BY created_at LIMIT {limit}"
                ))?;
                let items = stmt
                    .query_map([], row_to_item)?
                    .collect::<rusqlite::Result<_>>()?;
                Ok(items)
            })
    }

    /// Number of pending items
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn pending_count(&self) -> Result<u64> {
        self.cache.get_or_load(CacheScope::Inbox, "pending_count", || {
            let conn = conn(&self.pool)?;
            let n = conn.query_row(
                "SELECT COUNT(*) FROM inbox WHERE status = 'pending'",
                [],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    /// Mark an item as processed into some intent
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the item does not exist
    pub fn mark_processed(&self, id: &str, classified_as: &str) -> Result<()> {
        let conn = conn(&self.pool)?;
        let changed = conn.execute(
            "UPDATE inbox SET status = 'processed', classified_as = ?1, processed_at = ?2 \
             WHERE id = ?3",
            params![classified_as, timestamp(&Utc::now()), id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("inbox item {id}")));
        }
        drop(conn);
        self.cache.invalidate(CacheScope::Inbox);
        Ok(())
    }

    /// Store an idea or note
    ///
    /// # Errors
    ///
    /// Returns error if the content is empty or the insert fails
    pub fn add_note(&self, kind: NoteKind, content: &str) -> Result<Note> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation(format!("{} is empty", kind.as_str())));
        }

        let conn = conn(&self.pool)?;
        let note = Note {
            id: new_id(),
            kind,
            title: note_title(content),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO notes (id, kind, title, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                note.id,
                kind.as_str(),
                note.title,
                note.content,
                timestamp(&note.created_at)
            ],
        )?;
        drop(conn);
        self.cache.invalidate(CacheScope::Inbox);
        Ok(note)
    }

    /// Most recent notes of a kind
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn recent_notes(&self, kind: NoteKind, limit: usize) -> Result<Vec<Note>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, kind, title, content, created_at FROM notes WHERE kind = ?1 \
             ORDER BY created_at DESC LIMIT {limit}"
        ))?;
        let notes = stmt
            .query_map([kind.as_str()], row_to_note)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(notes)
    }
}
