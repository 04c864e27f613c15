//! In-memory knowledge store.
//!
//! Maps chunks to their embedding vectors and answers nearest-neighbor
//! queries by brute-force cosine similarity over all entries. Entries are
//! kept in insertion order; the store only ever grows until it is dropped
//! (reset discards the whole store, never individual entries).
//!
//! Mutation is all-or-nothing: every chunk in a batch is embedded before
//! any entry is added, so a failed embedding call leaves the store exactly
//! as it was.

use anyhow::{Context, Result};

use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::models::Chunk;

struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// An incrementally growable vector index over document chunks.
pub struct KnowledgeStore {
    entries: Vec<Entry>,
}

impl KnowledgeStore {
    /// Build a fresh store from an initial batch of chunks.
    ///
    /// Embeds every chunk via `embedder`; if any embedding fails, no store
    /// is created.
    pub async fn create(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<Self> {
        let mut store = Self {
            entries: Vec::new(),
        };
        store.append(chunks, embedder).await?;
        Ok(store)
    }

    /// Embed `chunks` and merge them into the index, keeping all prior
    /// entries. On failure the store is left unmodified.
    pub async fn append(&mut self, chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<()> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder
            .embed(&texts)
            .await
            .context("embedding backend failed")?;

        // Nothing is inserted until the whole batch embedded successfully.
        for (chunk, vector) in chunks.into_iter().zip(vectors.into_iter()) {
            self.entries.push(Entry { chunk, vector });
        }
        Ok(())
    }

    /// Return the `k` most similar chunks to `query_text`, best first.
    ///
    /// Ties break by insertion order (earlier-indexed chunk wins). Returns
    /// fewer than `k` results when the store is smaller; never pads.
    pub async fn search(
        &self,
        query_text: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<(Chunk, f32)>> {
        let query_vec = embed_query(embedder, query_text)
            .await
            .context("query embedding failed")?;

        let mut scored: Vec<(Chunk, f32)> = self
            .entries
            .iter()
            .map(|e| (e.chunk.clone(), cosine_similarity(&query_vec, &e.vector)))
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::split;
    use async_trait::async_trait;

    /// Deterministic test embedder: maps each text to a 26-dim letter
    /// histogram, so identical texts embed identically and similar texts
    /// score high under cosine similarity.
    struct HistogramEmbedder;

    #[async_trait]
    impl Embedder for HistogramEmbedder {
        fn model_name(&self) -> &str {
            "histogram-test"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_lowercase().chars() {
                        if c.is_ascii_lowercase() {
                            v[(c as u8 - b'a') as usize] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    /// Embedder that always fails, for all-or-nothing tests.
    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing-test"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            anyhow::bail!("backend unavailable")
        }
    }

    fn chunks_from(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .flat_map(|(i, t)| split(&format!("doc{}", i), t, 1000, 100))
            .collect()
    }

    #[tokio::test]
    async fn create_then_self_search_ranks_exact_match_first() {
        let chunks = chunks_from(&["zebra zoo zones", "apple banana", "quartz quill"]);
        let store = KnowledgeStore::create(chunks, &HistogramEmbedder)
            .await
            .unwrap();

        let hits = store.search("apple banana", 5, &HistogramEmbedder).await.unwrap();
        assert_eq!(hits[0].0.text, "apple banana");
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_returns_at_most_available_entries() {
        let store = KnowledgeStore::create(chunks_from(&["one", "two"]), &HistogramEmbedder)
            .await
            .unwrap();
        let hits = store.search("one", 5, &HistogramEmbedder).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn scores_are_descending() {
        let store = KnowledgeStore::create(
            chunks_from(&["alpha alpha", "beta", "alpha"]),
            &HistogramEmbedder,
        )
        .await
        .unwrap();
        let hits = store.search("alpha", 3, &HistogramEmbedder).await.unwrap();
        for pair in hits.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[tokio::test]
    async fn ties_break_by_insertion_order() {
        // Identical texts embed identically, so all scores tie.
        let chunks: Vec<Chunk> = (0..3)
            .flat_map(|i| split(&format!("doc{}", i), "same text", 1000, 100))
            .collect();
        let store = KnowledgeStore::create(chunks, &HistogramEmbedder)
            .await
            .unwrap();
        let hits = store.search("same text", 3, &HistogramEmbedder).await.unwrap();
        assert_eq!(hits[0].0.document_id, "doc0");
        assert_eq!(hits[1].0.document_id, "doc1");
        assert_eq!(hits[2].0.document_id, "doc2");
    }

    #[tokio::test]
    async fn append_preserves_prior_entries() {
        let mut store = KnowledgeStore::create(
            chunks_from(&["rust ownership", "borrow checker"]),
            &HistogramEmbedder,
        )
        .await
        .unwrap();

        let before: Vec<String> = store
            .search("rust", store.len(), &HistogramEmbedder)
            .await
            .unwrap()
            .into_iter()
            .map(|(c, _)| c.text)
            .collect();

        store
            .append(chunks_from(&["async runtime"]), &HistogramEmbedder)
            .await
            .unwrap();
        assert_eq!(store.len(), 3);

        let after: Vec<String> = store
            .search("rust", store.len(), &HistogramEmbedder)
            .await
            .unwrap()
            .into_iter()
            .map(|(c, _)| c.text)
            .collect();

        for text in before {
            assert!(after.contains(&text), "append dropped chunk: {}", text);
        }
    }

    #[tokio::test]
    async fn failed_create_builds_no_store() {
        let result = KnowledgeStore::create(chunks_from(&["anything"]), &FailingEmbedder).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn failed_append_leaves_store_unchanged() {
        let mut store = KnowledgeStore::create(chunks_from(&["kept"]), &HistogramEmbedder)
            .await
            .unwrap();
        let err = store
            .append(chunks_from(&["lost"]), &FailingEmbedder)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("embedding backend failed"));
        assert_eq!(store.len(), 1);
    }
}
