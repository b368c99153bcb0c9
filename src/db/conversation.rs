//! Per-chat conversation state and rolling history

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{DbPool, conn, parse_datetime, timestamp};
use crate::Result;

/// One line of conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Conversation repository
#[derive(Clone)]
pub struct ConversationRepo {
    pool: DbPool,
}

impl ConversationRepo {
    /// Create a new conversation repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Load a chat's persisted state and when it was written
    ///
    /// Rows that no longer deserialize are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn load_state<T: DeserializeOwned>(
        &self,
        chat_id: i64,
    ) -> Result<Option<(T, DateTime<Utc>)>> {
        let conn = conn(&self.pool)?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT state, updated_at FROM conversation_state WHERE chat_id = ?1",
                [chat_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(row.and_then(|(json, updated)| match serde_json::from_str(&json) {
            Ok(state) => Some((state, parse_datetime(&updated))),
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "discarding unreadable conversation state");
                None
            }
        }))
    }

    /// Persist a chat's state
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the upsert fails
    pub fn save_state<T: Serialize>(
        &self,
        chat_id: i64,
        state: &T,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO conversation_state (chat_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET state = excluded.state,
                                                updated_at = excluded.updated_at",
            params![chat_id, json, timestamp(&now)],
        )?;
        Ok(())
    }

    /// Forget a chat's state
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails
    pub fn clear_state(&self, chat_id: i64) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute("DELETE FROM conversation_state WHERE chat_id = ?1", [chat_id])?;
        Ok(())
    }

    /// Append a history line, keeping only the newest `keep` lines per chat
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails
    pub fn push_history(&self, chat_id: i64, role: &str, content: &str, keep: usize) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO conversation_history (chat_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![chat_id, role, content, timestamp(&Utc::now())],
        )?;
        conn.execute(
            "DELETE FROM conversation_history WHERE chat_id = ?1 AND id NOT IN (
                SELECT id FROM conversation_history WHERE chat_id = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![chat_id, i64::try_from(keep).unwrap_or(i64::MAX)],
        )?;
        Ok(())
    }

    /// The newest `limit` history lines, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn history(&self, chat_id: i64, limit: usize) -> Result<Vec<HistoryEntry>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT role, content, created_at FROM conversation_history
             WHERE chat_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let mut entries: Vec<HistoryEntry> = stmt
            .query_map(
                params![chat_id, i64::try_from(limit).unwrap_or(i64::MAX)],
                |row| {
                    Ok(HistoryEntry {
                        role: row.get(0)?,
                        content: row.get(1)?,
                        created_at: parse_datetime(&row.get::<_, String>(2)?),
                    })
                },
            )?
            .collect::<rusqlite::Result<_>>()?;
        entries.reverse();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "state")]
    enum Flow {
        Waiting { text: String },
    }

    #[test]
    fn state_roundtrip_and_clear() {
        let repo = ConversationRepo::new(init_memory().unwrap());
        assert!(repo.load_state::<Flow>(1).unwrap().is_none());

        let now = Utc::now();
        let state = Flow::Waiting { text: "pagar".into() };
        repo.save_state(1, &state, now).unwrap();

        let (loaded, at) = repo.load_state::<Flow>(1).unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(timestamp(&at), timestamp(&now));

        repo.clear_state(1).unwrap();
        assert!(repo.load_state::<Flow>(1).unwrap().is_none());
    }

    #[test]
    fn unreadable_state_is_absent() {
        let repo = ConversationRepo::new(init_memory().unwrap());
        repo.save_state(1, &"not a state", Utc::now()).unwrap();
        assert!(repo.load_state::<Flow>(1).unwrap().is_none());
    }

    #[test]
    fn history_is_trimmed_per_chat() {
        let repo = ConversationRepo::new(init_memory().unwrap());
        for i in 0..5 {
            repo.push_history(1, "user", &format!("m{i}"), 3).unwrap();
        }
        repo.push_history(2, "user", "other", 3).unwrap();

        let history = repo.history(1, 10).unwrap();
        let contents: Vec<&str> = history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
        assert_eq!(repo.history(2, 10).unwrap().len(), 1);
    }
}
