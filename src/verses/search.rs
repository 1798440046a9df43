//! Linear cosine-similarity search over the verse store.
//!
//! Not a true top-K index: candidates are capped at a fixed scan limit for
//! cost control, so correctness degrades silently beyond that cap. Fine at
//! the current scale (a few hundred verses).

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::llm::LlmClient;
use crate::persistence::PersistenceLayer;

use super::VerseMatch;

/// Cosine similarity: dot product over the product of L2 norms.
/// Returns 0 when either norm is 0 or the dimensions disagree.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Ranks stored verses against a free-text query.
#[derive(Debug, Clone)]
pub struct VerseSearcher {
    llm: Arc<dyn LlmClient>,
    persistence: Arc<dyn PersistenceLayer>,
    scan_limit: usize,
}

impl VerseSearcher {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        persistence: Arc<dyn PersistenceLayer>,
        scan_limit: usize,
    ) -> Self {
        Self {
            llm,
            persistence,
            scan_limit,
        }
    }

    /// Embed `query`, scan the candidate set, return the top `k` by
    /// descending similarity. Embedding failures propagate un-retried;
    /// retry policy belongs to the caller.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<VerseMatch>> {
        let query_embedding = self.llm.embed(query).await?;

        let candidates = self.persistence.load_embedded_verses(self.scan_limit).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        debug!(candidates = candidates.len(), "scanning verse candidates");

        let mut scored: Vec<VerseMatch> = candidates
            .into_iter()
            .map(|v| {
                let similarity = v
                    .embedding
                    .as_deref()
                    .map_or(0.0, |emb| cosine_similarity(&query_embedding, emb));
                VerseMatch {
                    book: v.book,
                    chapter: v.chapter,
                    verse: v.verse,
                    text: v.text,
                    similarity,
                }
            })
            .collect();

        // Stable sort; no tie-break beyond original order.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::persistence::providers::memory::MemoryProvider;
    use crate::verses::VerseRecord;

    fn verse(book: &str, chapter: i32, verse_no: i32, embedding: Vec<f32>) -> VerseRecord {
        VerseRecord {
            book: book.to_string(),
            chapter,
            verse: verse_no,
            text: format!("{book} {chapter}:{verse_no}"),
            translation: "개역개정".to_string(),
            embedding: Some(embedding),
        }
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = [1.0, 2.0, 3.0];
        let b = [0.5, -1.0, 2.0];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn cosine_self_is_one() {
        let a = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_dimensions_score_zero() {
        let short = [1.0, 2.0];
        let long = [1.0, 2.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&short, &long), 0.0);
        assert_eq!(cosine_similarity(&long, &short), 0.0);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&b, &a), 0.0);
    }

    #[tokio::test]
    async fn returns_top_k_by_similarity() {
        let llm = Arc::new(MockLlmClient::new());
        let query_emb = llm.embed("시험 걱정").await.unwrap();

        // One candidate aligned with the query embedding, two orthogonal-ish.
        let provider = Arc::new(MemoryProvider::with_verses(vec![
            verse("마태복음", 11, 28, query_emb.clone()),
            verse("시편", 23, 1, vec![0.0; 8]),
            verse("요한복음", 14, 27, query_emb.iter().map(|x| -x).collect()),
        ]));

        let searcher = VerseSearcher::new(llm, provider, 1000);
        let results = searcher.search("시험 걱정", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].book, "마태복음");
        assert!((results[0].similarity - 1.0).abs() < 1e-5);
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn empty_store_returns_empty() {
        let llm = Arc::new(MockLlmClient::new());
        let provider = Arc::new(MemoryProvider::new());
        let searcher = VerseSearcher::new(llm, provider, 1000);
        assert!(searcher.search("고민", 5).await.unwrap().is_empty());
    }
}
