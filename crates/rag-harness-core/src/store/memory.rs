//! In-memory [`VectorStore`] implementation for tests and ephemeral indexes.
//!
//! Records live in a single `Vec` behind `std::sync::RwLock`; an insert
//! takes the write lock once, so a concurrent search never observes a
//! half-written record. Search is brute-force cosine similarity.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::IndexError;
use crate::models::{ScoredChunk, VectorRecord};

use super::{rank, VectorStore};

/// In-memory vector store. Always initialized.
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> IndexError {
    IndexError::Store("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn is_initialized(&self) -> Result<bool, IndexError> {
        Ok(true)
    }

    async fn insert(&self, record: VectorRecord) -> Result<(), IndexError> {
        self.records.write().map_err(poisoned)?.push(record);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        model: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let records = self.records.read().map_err(poisoned)?;
        let candidates: Vec<ScoredChunk> = records
            .iter()
            .filter(|r| r.model == model)
            .map(|r| ScoredChunk {
                chunk: r.chunk.clone(),
                score: cosine_similarity(query, &r.embedding),
            })
            .collect();
        Ok(rank(candidates, k))
    }

    async fn len(&self, model: &str) -> Result<usize, IndexError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.iter().filter(|r| r.model == model).count())
    }

    async fn count_for_source(&self, source_id: &str, model: &str) -> Result<usize, IndexError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .iter()
            .filter(|r| r.model == model && r.chunk.source_id == source_id)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk;

    fn record(source: &str, text: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            chunk: chunk(source, text, 100, 0).unwrap().remove(0),
            embedding,
            model: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn search_empty_store() {
        let store = InMemoryVectorStore::new();
        assert!(store.search(&[1.0, 0.0], "test", 4).await.unwrap().is_empty());
        assert_eq!(store.len("test").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let store = InMemoryVectorStore::new();
        store.insert(record("a", "x", vec![0.0, 1.0])).await.unwrap();
        store.insert(record("b", "y", vec![1.0, 0.0])).await.unwrap();
        store.insert(record("c", "z", vec![1.0, 1.0])).await.unwrap();

        let results = store.search(&[1.0, 0.0], "test", 10).await.unwrap();
        let sources: Vec<&str> = results.iter().map(|r| r.chunk.source_id.as_str()).collect();
        assert_eq!(sources, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn search_ignores_other_models() {
        let store = InMemoryVectorStore::new();
        let mut other = record("a", "x", vec![1.0]);
        other.model = "other".to_string();
        store.insert(other).await.unwrap();
        assert!(store.search(&[1.0], "test", 4).await.unwrap().is_empty());
        assert_eq!(store.len("other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn count_for_source() {
        let store = InMemoryVectorStore::new();
        store.insert(record("a", "x", vec![1.0])).await.unwrap();
        store.insert(record("a", "y", vec![1.0])).await.unwrap();
        store.insert(record("b", "z", vec![1.0])).await.unwrap();
        assert_eq!(store.count_for_source("a", "test").await.unwrap(), 2);
        assert_eq!(store.count_for_source("c", "test").await.unwrap(), 0);
    }
}
