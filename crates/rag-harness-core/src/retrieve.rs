//! Top-k retrieval of annotated contexts.
//!
//! Every call is a fresh nearest-neighbor search against the index's
//! current contents; nothing is cached between calls.

use crate::error::{ConfigurationError, IndexError};
use crate::index::EmbeddingIndex;
use crate::models::Context;

/// Default number of contexts per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Retrieves ranked contexts for a question.
#[derive(Clone)]
pub struct Retriever {
    index: EmbeddingIndex,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: EmbeddingIndex, top_k: usize) -> Result<Self, ConfigurationError> {
        if top_k == 0 {
            return Err(ConfigurationError::new("top_k must be >= 1"));
        }
        Ok(Self { index, top_k })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    /// Retrieve the configured number of contexts.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<Context>, IndexError> {
        self.retrieve_k(question, self.top_k).await
    }

    /// Retrieve up to `k` contexts ordered by non-increasing similarity.
    ///
    /// Fails with [`IndexError::NotInitialized`] when the index was never
    /// created; an empty index yields an empty list.
    pub async fn retrieve_k(&self, question: &str, k: usize) -> Result<Vec<Context>, IndexError> {
        if !self.index.is_initialized().await? {
            return Err(IndexError::NotInitialized);
        }
        let results = self.index.query(question, k).await?;
        tracing::debug!(k, found = results.len(), "retrieved contexts");
        Ok(results.into_iter().map(Context::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::chunk::chunk;
    use crate::embedding::HashEmbedder;
    use crate::models::{ScoredChunk, VectorRecord};
    use crate::store::memory::InMemoryVectorStore;
    use crate::store::VectorStore;

    struct MissingStore;

    #[async_trait]
    impl VectorStore for MissingStore {
        async fn is_initialized(&self) -> Result<bool, IndexError> {
            Ok(false)
        }
        async fn insert(&self, _record: VectorRecord) -> Result<(), IndexError> {
            Err(IndexError::NotInitialized)
        }
        async fn search(
            &self,
            _query: &[f32],
            _model: &str,
            _k: usize,
        ) -> Result<Vec<ScoredChunk>, IndexError> {
            Err(IndexError::NotInitialized)
        }
        async fn len(&self, _model: &str) -> Result<usize, IndexError> {
            Err(IndexError::NotInitialized)
        }
        async fn count_for_source(&self, _s: &str, _m: &str) -> Result<usize, IndexError> {
            Err(IndexError::NotInitialized)
        }
    }

    fn memory_index() -> EmbeddingIndex {
        EmbeddingIndex::new(
            Arc::new(HashEmbedder::default()),
            Arc::new(InMemoryVectorStore::new()),
        )
    }

    #[test]
    fn zero_top_k_is_rejected() {
        assert!(Retriever::new(memory_index(), 0).is_err());
    }

    #[tokio::test]
    async fn empty_index_returns_no_contexts() {
        let retriever = Retriever::new(memory_index(), DEFAULT_TOP_K).unwrap();
        assert!(retriever.retrieve("what is X?").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn uninitialized_index_is_an_error() {
        let index = EmbeddingIndex::new(Arc::new(HashEmbedder::default()), Arc::new(MissingStore));
        let retriever = Retriever::new(index, DEFAULT_TOP_K).unwrap();
        let err = retriever.retrieve("q").await.unwrap_err();
        assert!(matches!(err, IndexError::NotInitialized));
    }

    #[tokio::test]
    async fn contexts_carry_provenance_and_sorted_scores() {
        let index = memory_index();
        let text = "Rust has ownership. ".repeat(20) + &"Go has goroutines. ".repeat(20);
        for c in chunk("guide.txt", &text, 100, 20).unwrap() {
            index.embed_and_insert(c).await.unwrap();
        }
        let total = index.len().await.unwrap();
        let retriever = Retriever::new(index, 2).unwrap();

        let contexts = retriever.retrieve("ownership").await.unwrap();
        assert_eq!(contexts.len(), 2);
        for ctx in &contexts {
            let pos = ctx.source_position.as_ref().unwrap();
            assert_eq!(pos.source_id, "guide.txt");
            assert!(ctx.token_count > 0);
        }
        assert!(contexts[0].score >= contexts[1].score);

        let all = retriever.retrieve_k("ownership", total + 10).await.unwrap();
        assert_eq!(all.len(), total);
    }
}
