//! Stored embedding vectors

use chrono::Utc;
use rusqlite::params;

use super::{DbPool, conn, timestamp};
use crate::Result;

/// An embedded entity
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub entity_type: String,
    pub entity_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Convert an embedding to little-endian bytes for storage
#[must_use]
pub fn to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert stored bytes back to an embedding
#[must_use]
pub fn from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let mut arr = [0_u8; 4];
            arr.copy_from_slice(chunk);
            f32::from_le_bytes(arr)
        })
        .collect()
}

/// Embedding repository
#[derive(Clone)]
pub struct EmbeddingRepo {
    pool: DbPool,
}

impl EmbeddingRepo {
    /// Create a new embedding repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or replace the vector for an entity
    ///
    /// # Errors
    ///
    /// Returns error if the upsert fails
    pub fn upsert(
        &self,
        entity_type: &str,
        entity_id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO embeddings (entity_type, entity_id, content, embedding, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                content = excluded.content,
                embedding = excluded.embedding,
                updated_at = excluded.updated_at",
            params![
                entity_type,
                entity_id,
                content,
                to_bytes(embedding),
                timestamp(&Utc::now())
            ],
        )?;
        Ok(())
    }

    /// Every vector of one entity type
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn list(&self, entity_type: &str) -> Result<Vec<EmbeddingRecord>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT entity_type, entity_id, content, embedding FROM embeddings
             WHERE entity_type = ?1",
        )?;
        let records = stmt
            .query_map([entity_type], |row| {
                let blob: Vec<u8> = row.get(3)?;
                Ok(EmbeddingRecord {
                    entity_type: row.get(0)?,
                    entity_id: row.get(1)?,
                    content: row.get(2)?,
                    embedding: from_bytes(&blob),
                })
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(records)
    }

    /// Remove an entity's vector
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails
    pub fn delete(&self, entity_type: &str, entity_id: &str) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "DELETE FROM embeddings WHERE entity_type = ?1 AND entity_id = ?2",
            params![entity_type, entity_id],
        )?;
        Ok(())
    }

    /// Total stored vectors
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn count(&self) -> Result<u64> {
        let conn = conn(&self.pool)?;
        let n = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[test]
    fn bytes_roundtrip() {
        let v = vec![0.25_f32, -1.5, 3.0];
        assert_eq!(from_bytes(&to_bytes(&v)), v);
    }

    #[test]
    fn upsert_replaces() {
        let repo = EmbeddingRepo::new(init_memory().unwrap());
        repo.upsert("task", "t1", "a", &[1.0, 0.0]).unwrap();
        repo.upsert("task", "t1", "b", &[0.0, 1.0]).unwrap();
        repo.upsert("note", "n1", "c", &[1.0, 1.0]).unwrap();

        let tasks = repo.list("task").unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].content, "b");
        assert_eq!(tasks[0].embedding, vec![0.0, 1.0]);
        assert_eq!(repo.count().unwrap(), 2);

        repo.delete("task", "t1").unwrap();
        assert!(repo.list("task").unwrap().is_empty());
    }
}
