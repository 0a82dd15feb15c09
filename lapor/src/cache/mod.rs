//! Similarity cache: prior successful turns indexed by semantic closeness.
//!
//! Only successful outcomes are ever persisted, and near-identical messages
//! are deduplicated at write time, so the cache stays a small, high-quality
//! set of exemplar phrasings.

mod embedding;

pub use embedding::{
    cosine_similarity, EmbeddingError, EmbeddingProvider, HashEmbeddingProvider,
    OllamaEmbeddingProvider,
};

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dialogue::SlotMap;

/// Similarity floor for search hits.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;
/// Similarity above which two messages count as the same record.
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.98;

/// One cached outcome: the triggering message, its embedding and the slot map
/// that was collected by the time the dialogue succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityRecord {
    pub id: String,
    pub session_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    pub slots: SlotMap,
    pub outcome_id: String,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// A search result with its similarity to the query message.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: SimilarityRecord,
    pub similarity: f64,
}

/// Optional indexed approximate-search path. When a deployment wires one in,
/// `search` consults it first; the manual cosine scan remains the fallback.
pub trait VectorIndex: Send + Sync {
    /// Ranked (record id, similarity) candidates for a query embedding, or
    /// `None` when the index cannot serve the query.
    fn search(&self, query: &[f32], k: usize) -> Option<Vec<(String, f64)>>;
}

/// Similarity cache over an embedding provider.
pub struct SimilarityCache {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Option<Arc<dyn VectorIndex>>,
    records: RwLock<Vec<SimilarityRecord>>,
    threshold: f64,
    dedup_threshold: f64,
}

impl SimilarityCache {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            index: None,
            records: RwLock::new(Vec::new()),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
        }
    }

    pub fn with_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_dedup_threshold(mut self, threshold: f64) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find prior records similar to `message`, ranked success-first then by
    /// similarity descending, truncated to `k`.
    pub async fn search(&self, message: &str, k: usize) -> Result<Vec<SearchHit>, EmbeddingError> {
        let query = self.embedder.embed(message).await?;
        Ok(self.search_embedded(&query, k))
    }

    fn search_embedded(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let records = match self.records.read() {
            Ok(records) => records,
            Err(_) => return Vec::new(),
        };

        let mut hits: Vec<SearchHit> = if let Some(candidates) =
            self.index.as_ref().and_then(|index| index.search(query, k))
        {
            candidates
                .into_iter()
                .filter(|(_, similarity)| *similarity >= self.threshold)
                .filter_map(|(id, similarity)| {
                    records
                        .iter()
                        .find(|r| r.id == id)
                        .map(|record| SearchHit {
                            record: record.clone(),
                            similarity,
                        })
                })
                .collect()
        } else {
            // Manual cosine scan fallback.
            records
                .iter()
                .map(|record| SearchHit {
                    similarity: cosine_similarity(query, &record.embedding),
                    record: record.clone(),
                })
                .filter(|hit| hit.similarity >= self.threshold)
                .collect()
        };

        hits.sort_by(|a, b| {
            b.record
                .success
                .cmp(&a.record.success)
                .then(b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal))
        });
        hits.truncate(k);
        hits
    }

    /// Store a successful outcome.
    ///
    /// Quality gate: failed or incomplete dialogues (`success` false or an
    /// empty outcome id) are never cached, and a message nearly identical to
    /// an existing record returns that record's id instead of inserting a
    /// duplicate.
    pub async fn store(
        &self,
        session_id: &str,
        message: &str,
        slots: &SlotMap,
        outcome_id: &str,
        success: bool,
    ) -> Result<Option<String>, EmbeddingError> {
        if !success || outcome_id.is_empty() {
            tracing::debug!(session_id, "skipping cache store for unsuccessful outcome");
            return Ok(None);
        }

        let embedding = self.embedder.embed(message).await?;

        {
            let records = self
                .records
                .read()
                .map_err(|_| EmbeddingError::Malformed("record store poisoned".to_string()))?;
            if let Some(existing) = records
                .iter()
                .find(|r| cosine_similarity(&embedding, &r.embedding) > self.dedup_threshold)
            {
                tracing::debug!(
                    session_id,
                    existing = existing.id.as_str(),
                    "near-duplicate message, reusing cached record"
                );
                return Ok(Some(existing.id.clone()));
            }
        }

        let record = SimilarityRecord {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            message: message.to_string(),
            embedding,
            slots: slots.clone(),
            outcome_id: outcome_id.to_string(),
            success,
            created_at: Utc::now(),
        };
        let id = record.id.clone();
        self.records
            .write()
            .map_err(|_| EmbeddingError::Malformed("record store poisoned".to_string()))?
            .push(record);
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Maps exact strings to fixed vectors, so similarities are controlled.
    struct MockEmbedding {
        vectors: HashMap<&'static str, Vec<f32>>,
    }

    impl MockEmbedding {
        fn new(entries: &[(&'static str, Vec<f32>)]) -> Arc<Self> {
            Arc::new(Self {
                vectors: entries.iter().cloned().collect(),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.vectors
                .get(text)
                .cloned()
                .ok_or_else(|| EmbeddingError::Malformed(format!("no vector for '{}'", text)))
        }
    }

    fn slots() -> SlotMap {
        let mut slots = SlotMap::new();
        slots.insert(crate::dialogue::SlotKey::MerchantId, "FINPAY770");
        slots
    }

    #[tokio::test]
    async fn quality_gate_rejects_failures() {
        let embedder = MockEmbedding::new(&[("msg", vec![1.0, 0.0])]);
        let cache = SimilarityCache::new(embedder);

        assert_eq!(cache.store("s1", "msg", &slots(), "42", false).await.unwrap(), None);
        assert_eq!(cache.store("s1", "msg", &slots(), "", true).await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn storing_near_duplicate_creates_exactly_one_record() {
        let embedder = MockEmbedding::new(&[
            ("buatkan report transaksi", vec![1.0, 0.0, 0.0]),
            // Slightly rotated, similarity ≈ 0.995 > 0.98.
            ("buatkan laporan transaksi", vec![0.995, 0.0999, 0.0]),
        ]);
        let cache = SimilarityCache::new(embedder);

        let first = cache
            .store("s1", "buatkan report transaksi", &slots(), "42", true)
            .await
            .unwrap()
            .unwrap();
        let second = cache
            .store("s2", "buatkan laporan transaksi", &slots(), "43", true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn search_filters_by_threshold_and_ranks_by_similarity() {
        let embedder = MockEmbedding::new(&[
            ("query", vec![1.0, 0.0]),
            ("close", vec![0.95, 0.31]),
            ("far", vec![0.0, 1.0]),
        ]);
        let cache = SimilarityCache::new(embedder);

        cache.store("s1", "close", &slots(), "1", true).await.unwrap();
        cache.store("s2", "far", &slots(), "2", true).await.unwrap();

        let hits = cache.search("query", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.message, "close");
        assert!(hits[0].similarity >= DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[tokio::test]
    async fn indexed_path_is_used_when_available() {
        struct FixedIndex {
            id: String,
        }
        impl VectorIndex for FixedIndex {
            fn search(&self, _query: &[f32], _k: usize) -> Option<Vec<(String, f64)>> {
                Some(vec![(self.id.clone(), 0.93)])
            }
        }

        let embedder = MockEmbedding::new(&[
            ("stored", vec![1.0, 0.0]),
            ("query", vec![0.0, 1.0]),
        ]);
        let cache = SimilarityCache::new(embedder);
        let id = cache
            .store("s1", "stored", &slots(), "7", true)
            .await
            .unwrap()
            .unwrap();
        let cache = cache.with_index(Arc::new(FixedIndex { id }));

        // The manual scan would score 0.0; the index says 0.93.
        let hits = cache.search("query", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].similarity - 0.93).abs() < 1e-9);
    }

    #[tokio::test]
    async fn search_returns_top_k() {
        let embedder = MockEmbedding::new(&[
            ("query", vec![1.0, 0.0]),
            ("a", vec![1.0, 0.05]),
            ("b", vec![1.0, 0.1]),
            ("c", vec![1.0, 0.15]),
        ]);
        let cache = SimilarityCache::new(embedder).with_dedup_threshold(1.1);

        for (message, outcome) in [("a", "1"), ("b", "2"), ("c", "3")] {
            cache.store("s", message, &slots(), outcome, true).await.unwrap();
        }

        let hits = cache.search("query", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.message, "a");
        assert!(hits[0].similarity >= hits[1].similarity);
    }
}
