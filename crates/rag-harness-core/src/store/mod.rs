//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait defines the append-only storage needed by the
//! [`EmbeddingIndex`](crate::index::EmbeddingIndex), enabling pluggable
//! backends (SQLite in the app crate, in-memory here).
//!
//! Implementations must be `Send + Sync` and must make each
//! [`insert`](VectorStore::insert) atomic with respect to concurrent
//! [`search`](VectorStore::search) calls: a search sees a record either
//! completely or not at all.

pub mod memory;

use async_trait::async_trait;

use crate::error::IndexError;
use crate::models::{ScoredChunk, VectorRecord};

/// Append-only vector store with brute-force nearest-neighbor search.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`is_initialized`](VectorStore::is_initialized) | Whether the store has been created |
/// | [`insert`](VectorStore::insert) | Append one vector record |
/// | [`search`](VectorStore::search) | Top-k cosine similarity search |
/// | [`len`](VectorStore::len) | Number of records for a model |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether the backing storage exists. Querying an uninitialized
    /// store is an error; querying an initialized empty one is not.
    async fn is_initialized(&self) -> Result<bool, IndexError>;

    /// Append a record. There is no update or delete.
    async fn insert(&self, record: VectorRecord) -> Result<(), IndexError>;

    /// Return up to `k` records embedded with `model`, ordered by
    /// descending cosine similarity to `query`. Ties keep insertion order.
    async fn search(
        &self,
        query: &[f32],
        model: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Number of records embedded with `model`.
    async fn len(&self, model: &str) -> Result<usize, IndexError>;

    /// Number of records for `model` whose chunk came from `source_id`.
    async fn count_for_source(&self, source_id: &str, model: &str) -> Result<usize, IndexError>;
}

/// Sort candidates by descending score, keeping insertion order for ties,
/// and keep the first `k`.
///
/// `candidates` must already be in insertion order; `sort_by` is stable.
pub fn rank(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(k);
    candidates
}
