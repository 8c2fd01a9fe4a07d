//! Typed error taxonomy for the ingestion and answer pipelines.
//!
//! Each stage fails with its own error type so callers can decide how to
//! surface it: configuration problems are fatal, ingestion failures are
//! isolated per document, retrieval and generation failures abort the
//! answer request they belong to. Nothing in the core retries.

use thiserror::Error;

/// Invalid chunking, retrieval, or prompt parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("configuration error: {0}")]
pub struct ConfigurationError(pub String);

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failures of the embedding index: embedding a text, touching the
/// vector store, or querying a store that was never created.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    Store(String),

    #[error("index not initialized")]
    NotInitialized,
}

/// Failure while ingesting a single document.
///
/// Reported through the document's `error` progress event; it never
/// aborts the remaining documents of the same batch.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("failed to load {name}: {reason}")]
    Load { name: String, reason: String },

    #[error(transparent)]
    Chunking(#[from] ConfigurationError),

    #[error("failed to insert chunk {position} of {source_id}: {source}")]
    Insert {
        source_id: String,
        position: usize,
        #[source]
        source: IndexError,
    },

    #[error("ingest ledger error: {0}")]
    Ledger(String),

    #[error("ingestion of {name} panicked: {reason}")]
    Panicked { name: String, reason: String },
}

/// Failure of the remote completion call.
///
/// A non-success status carries the upstream body verbatim.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation request timed out after {0} seconds")]
    Timeout(u64),

    #[error("generation request failed: {0}")]
    Transport(String),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),
}

/// Failure of an end-to-end answer request.
#[derive(Error, Debug)]
pub enum AnswerError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}
