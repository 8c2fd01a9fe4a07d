//! Tracking of already-ingested document identifiers.
//!
//! The ledger makes ingestion idempotent per identifier. A document is
//! claimed (`Unseen → Processing`) before chunking, marked `Indexed` only
//! after every chunk was inserted, and released back to `Unseen` when
//! ingestion fails so a later retry can reprocess it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::IngestionError;
use crate::models::DocumentState;

/// Storage for document processing states.
#[async_trait]
pub trait IngestLedger: Send + Sync {
    async fn state(&self, document_id: &str) -> Result<DocumentState, IngestionError>;

    /// Move `document_id` from `Unseen` to `Processing`.
    ///
    /// Returns `false` without changing anything when the document is
    /// already processing or indexed.
    async fn try_claim(&self, document_id: &str) -> Result<bool, IngestionError>;

    /// Record that all `chunk_count` chunks of `document_id` are indexed.
    async fn mark_indexed(&self, document_id: &str, chunk_count: usize)
        -> Result<(), IngestionError>;

    /// Return a claimed document to `Unseen` after a failure.
    async fn release(&self, document_id: &str) -> Result<(), IngestionError>;
}

/// Volatile ledger: a restart forgets prior uploads.
#[derive(Default)]
pub struct MemoryLedger {
    states: Mutex<HashMap<String, DocumentState>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> IngestionError {
    IngestionError::Ledger("ledger lock poisoned".to_string())
}

#[async_trait]
impl IngestLedger for MemoryLedger {
    async fn state(&self, document_id: &str) -> Result<DocumentState, IngestionError> {
        let states = self.states.lock().map_err(poisoned)?;
        Ok(states
            .get(document_id)
            .copied()
            .unwrap_or(DocumentState::Unseen))
    }

    async fn try_claim(&self, document_id: &str) -> Result<bool, IngestionError> {
        let mut states = self.states.lock().map_err(poisoned)?;
        match states.get(document_id) {
            Some(DocumentState::Processing) | Some(DocumentState::Indexed) => Ok(false),
            _ => {
                states.insert(document_id.to_string(), DocumentState::Processing);
                Ok(true)
            }
        }
    }

    async fn mark_indexed(
        &self,
        document_id: &str,
        _chunk_count: usize,
    ) -> Result<(), IngestionError> {
        let mut states = self.states.lock().map_err(poisoned)?;
        states.insert(document_id.to_string(), DocumentState::Indexed);
        Ok(())
    }

    async fn release(&self, document_id: &str) -> Result<(), IngestionError> {
        let mut states = self.states.lock().map_err(poisoned)?;
        if states.get(document_id) == Some(&DocumentState::Processing) {
            states.remove(document_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.state("a").await.unwrap(), DocumentState::Unseen);
        assert!(ledger.try_claim("a").await.unwrap());
        assert_eq!(ledger.state("a").await.unwrap(), DocumentState::Processing);
        assert!(!ledger.try_claim("a").await.unwrap());
        ledger.mark_indexed("a", 3).await.unwrap();
        assert_eq!(ledger.state("a").await.unwrap(), DocumentState::Indexed);
        assert!(!ledger.try_claim("a").await.unwrap());
    }

    #[tokio::test]
    async fn release_allows_retry() {
        let ledger = MemoryLedger::new();
        assert!(ledger.try_claim("a").await.unwrap());
        ledger.release("a").await.unwrap();
        assert_eq!(ledger.state("a").await.unwrap(), DocumentState::Unseen);
        assert!(ledger.try_claim("a").await.unwrap());
    }

    #[tokio::test]
    async fn release_never_unindexes() {
        let ledger = MemoryLedger::new();
        ledger.try_claim("a").await.unwrap();
        ledger.mark_indexed("a", 1).await.unwrap();
        ledger.release("a").await.unwrap();
        assert_eq!(ledger.state("a").await.unwrap(), DocumentState::Indexed);
    }
}
