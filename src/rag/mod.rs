//! Embedding-based retrieval for duplicate detection
//!
//! Vectors live in the `embeddings` table; lookups are a linear cosine scan
//! over every vector of one entity type.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::db::EmbeddingRepo;

/// Entity type used for task vectors
pub const TASK_ENTITY: &str = "task";

/// Text embedding capability
#[async_trait]
pub trait Embed: Send + Sync {
    /// Embed text into a fixed-size vector
    ///
    /// # Errors
    ///
    /// Returns `Error::Embedding` if the provider fails
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or a zero-magnitude vector.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0_f64, 0.0_f64, 0.0_f64), |acc, (x, y)| {
        let (x, y) = (f64::from(*x), f64::from(*y));
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }

    (dot / denom) as f32
}

/// A stored entity scored against a query
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarMatch {
    pub entity_id: String,
    pub content: String,
    pub score: f32,
}

/// Retriever over stored embeddings
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embed>,
    repo: EmbeddingRepo,
    threshold: f32,
}

impl Retriever {
    /// Create a retriever; `threshold` is the duplicate cut-off
    #[must_use]
    pub fn new(embedder: Arc<dyn Embed>, repo: EmbeddingRepo, threshold: f32) -> Self {
        Self {
            embedder,
            repo,
            threshold,
        }
    }

    /// Duplicate cut-off
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Embed and store an entity
    ///
    /// # Errors
    ///
    /// Returns error if embedding or storage fails
    pub async fn index(&self, entity_type: &str, entity_id: &str, content: &str) -> Result<()> {
        let vector = self.embedder.embed(content).await?;
        self.repo.upsert(entity_type, entity_id, content, &vector)?;
        tracing::debug!(entity_type, entity_id, dims = vector.len(), "indexed");
        Ok(())
    }

    /// Forget an entity
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails
    pub fn remove(&self, entity_type: &str, entity_id: &str) -> Result<()> {
        self.repo.delete(entity_type, entity_id)
    }

    /// The `limit` stored entities most similar to `text`, best first
    ///
    /// # Errors
    ///
    /// Returns error if embedding or the scan fails
    pub async fn find_similar(
        &self,
        entity_type: &str,
        text: &str,
        limit: usize,
    ) -> Result<Vec<SimilarMatch>> {
        let query = self.embedder.embed(text).await?;
        let mut matches: Vec<SimilarMatch> = self
            .repo
            .list(entity_type)?
            .into_iter()
            .map(|record| SimilarMatch {
                score: cosine_similarity(&query, &record.embedding),
                entity_id: record.entity_id,
                content: record.content,
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(limit);
        Ok(matches)
    }

    /// Every match scoring strictly above the threshold, best first
    ///
    /// Callers pick the first one still relevant to them, so a stale
    /// entity ranked on top cannot hide a live one below it.
    ///
    /// # Errors
    ///
    /// Returns error if embedding or the scan fails
    pub async fn find_duplicates(
        &self,
        entity_type: &str,
        text: &str,
    ) -> Result<Vec<SimilarMatch>> {
        let mut matches = self.find_similar(entity_type, text, usize::MAX).await?;
        matches.retain(|m| m.score > self.threshold);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    /// Maps known phrases to fixed vectors
    struct FixedEmbedder;

    #[async_trait]
    impl Embed for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                "comprar leche" => vec![1.0, 0.0, 0.0],
                "comprar leche y pan" => vec![0.9, 0.3, 0.0],
                "leche" => vec![0.7, 0.714, 0.0],
                _ => vec![0.0, 0.0, 1.0],
            })
        }
    }

    fn retriever() -> Retriever {
        Retriever::new(
            Arc::new(FixedEmbedder),
            EmbeddingRepo::new(init_memory().unwrap()),
            0.75,
        )
    }

    #[test]
    fn cosine_identical_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert!(cosine_similarity(&[], &[]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn similar_above_threshold_is_duplicate() {
        let r = retriever();
        r.index(TASK_ENTITY, "t1", "comprar leche").await.unwrap();

        let dups = r.find_duplicates(TASK_ENTITY, "comprar leche y pan").await.unwrap();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].entity_id, "t1");
    }

    #[tokio::test]
    async fn unrelated_is_not_duplicate() {
        let r = retriever();
        r.index(TASK_ENTITY, "t1", "comprar leche").await.unwrap();

        assert!(r.find_duplicates(TASK_ENTITY, "llamar al banco").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn below_threshold_is_not_duplicate() {
        let r = retriever();
        r.index(TASK_ENTITY, "t1", "comprar leche").await.unwrap();

        let best = r.find_similar(TASK_ENTITY, "leche", 1).await.unwrap();
        assert!(best[0].score < 0.75);
        assert!(r.find_duplicates(TASK_ENTITY, "leche").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn score_equal_to_threshold_is_not_duplicate() {
        let r = Retriever::new(
            Arc::new(FixedEmbedder),
            EmbeddingRepo::new(init_memory().unwrap()),
            1.0,
        );
        r.index(TASK_ENTITY, "t1", "comprar leche").await.unwrap();

        let best = r.find_similar(TASK_ENTITY, "comprar leche", 1).await.unwrap();
        assert!((best[0].score - 1.0).abs() < f32::EPSILON);
        assert!(r.find_duplicates(TASK_ENTITY, "comprar leche").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn every_duplicate_is_returned_best_first() {
        let r = retriever();
        r.index(TASK_ENTITY, "near", "comprar leche y pan").await.unwrap();
        r.index(TASK_ENTITY, "exact", "comprar leche").await.unwrap();
        r.index(TASK_ENTITY, "far", "otra cosa").await.unwrap();

        let dups = r.find_duplicates(TASK_ENTITY, "comprar leche").await.unwrap();
        let ids: Vec<_> = dups.iter().map(|m| m.entity_id.as_str()).collect();
        assert_eq!(ids, ["exact", "near"]);
    }

    #[tokio::test]
    async fn results_are_ranked_and_removable() {
        let r = retriever();
        r.index(TASK_ENTITY, "a", "comprar leche").await.unwrap();
        r.index(TASK_ENTITY, "b", "otra cosa").await.unwrap();

        let hits = r.find_similar(TASK_ENTITY, "comprar leche y pan", 5).await.unwrap();
        assert_eq!(hits[0].entity_id, "a");
        assert_eq!(hits.len(), 2);

        r.remove(TASK_ENTITY, "a").unwrap();
        let hits = r.find_similar(TASK_ENTITY, "comprar leche y pan", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
