//! Embedding index: embeds chunks once and answers similarity queries.
//!
//! Wraps an [`Embedder`] and a [`VectorStore`] handle. Both are passed in
//! explicitly so each caller (server, CLI, test) owns its own index
//! instead of sharing a process-wide singleton.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::IndexError;
use crate::models::{Chunk, ScoredChunk, VectorRecord};
use crate::store::VectorStore;

/// Append-only semantic index over chunks.
#[derive(Clone)]
pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl EmbeddingIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Versioned name of the embedding function in use.
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    pub async fn is_initialized(&self) -> Result<bool, IndexError> {
        self.store.is_initialized().await
    }

    /// Embed the chunk's content and append one vector record.
    ///
    /// The content is the sole embedding input.
    pub async fn embed_and_insert(&self, chunk: Chunk) -> Result<(), IndexError> {
        let embedding = self.embedder.embed_one(&chunk.content).await?;
        if embedding.len() != self.embedder.dims() {
            return Err(IndexError::Embedding(format!(
                "expected {} dimensions from {}, got {}",
                self.embedder.dims(),
                self.embedder.model_name(),
                embedding.len()
            )));
        }
        self.store
            .insert(VectorRecord {
                chunk,
                embedding,
                model: self.embedder.model_name().to_string(),
            })
            .await
    }

    /// Top-`k` chunks most similar to `text`, length `min(k, len)`.
    ///
    /// An empty index yields an empty result.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed_one(text).await?;
        self.store
            .search(&query, self.embedder.model_name(), k)
            .await
    }

    /// Number of vector records produced by the active embedding function.
    pub async fn len(&self) -> Result<usize, IndexError> {
        self.store.len(self.embedder.model_name()).await
    }

    pub async fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len().await? == 0)
    }

    /// Number of vector records originating from `source_id`.
    pub async fn count_for_source(&self, source_id: &str) -> Result<usize, IndexError> {
        self.store
            .count_for_source(source_id, self.embedder.model_name())
            .await
    }
}
