//! Query-time retrieval with graceful degradation.
//!
//! Retrieval is gated on two independent factors: the caller's opt-in
//! (`enabled`) and the structural presence of a knowledge store. If either
//! gate is closed the store is never touched and the context is empty.
//!
//! A failing search also yields empty context: a broken retrieval path
//! must never block the ability to chat. The error branch is explicit
//! here so the availability-over-correctness policy is visible in code.

use crate::embedding::Embedder;
use crate::store::KnowledgeStore;

/// Return retrieved context for `query`, or an empty string.
///
/// The returned text is the top-`k` chunk texts joined by a single
/// newline, in descending relevance order.
pub async fn retrieve_context(
    store: Option<&KnowledgeStore>,
    query: &str,
    enabled: bool,
    k: usize,
    embedder: &dyn Embedder,
) -> String {
    if !enabled {
        return String::new();
    }
    let store = match store {
        Some(s) => s,
        None => return String::new(),
    };

    match store.search(query, k, embedder).await {
        Ok(hits) => hits
            .iter()
            .map(|(chunk, _)| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => {
            eprintln!("retrieval failed, answering ungrounded: {}", e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::split;
    use anyhow::Result;
    use async_trait::async_trait;

    struct ConstantEmbedder;

    #[async_trait]
    impl Embedder for ConstantEmbedder {
        fn model_name(&self) -> &str {
            "constant-test"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

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

    async fn sample_store() -> KnowledgeStore {
        let chunks = split("doc0", "first chunk text", 1000, 100)
            .into_iter()
            .chain(split("doc1", "second chunk text", 1000, 100))
            .collect();
        KnowledgeStore::create(chunks, &ConstantEmbedder).await.unwrap()
    }

    #[tokio::test]
    async fn absent_store_yields_empty_context() {
        let ctx = retrieve_context(None, "q", true, 5, &ConstantEmbedder).await;
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn disabled_flag_yields_empty_context_even_with_store() {
        let store = sample_store().await;
        let ctx = retrieve_context(Some(&store), "q", false, 5, &ConstantEmbedder).await;
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn hits_are_joined_by_single_newline() {
        let store = sample_store().await;
        let ctx = retrieve_context(Some(&store), "q", true, 5, &ConstantEmbedder).await;
        assert_eq!(ctx, "first chunk text\nsecond chunk text");
    }

    #[tokio::test]
    async fn search_failure_degrades_to_empty_context() {
        let store = sample_store().await;
        let ctx = retrieve_context(Some(&store), "q", true, 5, &FailingEmbedder).await;
        assert!(ctx.is_empty());
    }
}
