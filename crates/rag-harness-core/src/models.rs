//! Core data models used throughout RAG Harness.
//!
//! These types represent the documents, chunks, vector records, retrieved
//! contexts, and progress events that flow through the write path
//! (document → chunks → vectors) and the read path (question → contexts →
//! prompt → answer).

use serde::{Deserialize, Serialize};

/// A loaded document ready for chunking.
///
/// `id` is the upload identifier (filename or URL) and is the unit of
/// ingestion idempotence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub content: String,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// Processing state of a document identifier.
///
/// Moves `Unseen → Processing → Indexed`. A failed ingestion falls back
/// to `Unseen` so the document can be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Unseen,
    Processing,
    Indexed,
}

/// A bounded span of a document's text, the unit of embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic UUID derived from source id, position, and content hash.
    pub id: String,
    /// Identifier of the originating document.
    pub source_id: String,
    /// Ordinal of the chunk within its document, starting at 0.
    pub position: usize,
    /// The chunk text.
    pub content: String,
    /// Estimated token count of `content`.
    pub token_count: usize,
    /// First chunking unit covered by this chunk (inclusive).
    pub start: usize,
    /// Last chunking unit covered by this chunk (exclusive).
    pub end: usize,
    /// SHA-256 of `content`.
    pub hash: String,
}

/// A chunk together with its embedding, as stored in the index.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    /// Versioned name of the embedding function that produced `embedding`.
    pub model: String,
}

/// A chunk returned from a similarity query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity between the query and the chunk embedding.
    pub score: f32,
}

/// Provenance of a retrieved context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub source_id: String,
    pub position: usize,
    pub start: usize,
    pub end: usize,
}

/// A retrieved span handed to prompt assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_position: Option<SourcePosition>,
    #[serde(default)]
    pub token_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl From<ScoredChunk> for Context {
    fn from(scored: ScoredChunk) -> Self {
        let chunk = scored.chunk;
        Context {
            source_position: Some(SourcePosition {
                source_id: chunk.source_id,
                position: chunk.position,
                start: chunk.start,
                end: chunk.end,
            }),
            token_count: chunk.token_count,
            content: chunk.content,
            score: Some(scored.score),
        }
    }
}

/// Rendered prompt text sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Text produced by the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
}

impl Answer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            answer: text.into(),
        }
    }
}

/// Status carried by a [`ProgressEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Processing,
    Complete,
    Error,
}

/// Observational progress emitted while a document is ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Identifier of the document this event belongs to.
    pub document: String,
    pub chunks_processed: usize,
    pub chunks_total: usize,
    /// `chunks_processed / chunks_total` as a percentage.
    pub progress: f64,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn processing(document: &str, processed: usize, total: usize) -> Self {
        Self {
            document: document.to_string(),
            chunks_processed: processed,
            chunks_total: total,
            progress: percentage(processed, total),
            status: ProgressStatus::Processing,
            error: None,
        }
    }

    pub fn complete(document: &str, processed: usize, total: usize) -> Self {
        Self {
            document: document.to_string(),
            chunks_processed: processed,
            chunks_total: total,
            progress: 100.0,
            status: ProgressStatus::Complete,
            error: None,
        }
    }

    pub fn error(document: &str, processed: usize, total: usize, reason: String) -> Self {
        Self {
            document: document.to_string(),
            chunks_processed: processed,
            chunks_total: total,
            progress: percentage(processed, total),
            status: ProgressStatus::Error,
            error: Some(reason),
        }
    }

    /// True for the event that ends a document's sub-sequence.
    pub fn is_terminal(&self) -> bool {
        self.status != ProgressStatus::Processing
    }
}

fn percentage(processed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        processed as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_percentage() {
        let ev = ProgressEvent::processing("a.txt", 1, 4);
        assert!((ev.progress - 25.0).abs() < 1e-9);
        assert!(!ev.is_terminal());
    }

    #[test]
    fn empty_document_is_fully_processed() {
        let ev = ProgressEvent::complete("a.txt", 0, 0);
        assert_eq!(ev.progress, 100.0);
        assert!(ev.is_terminal());
    }

    #[test]
    fn context_from_scored_chunk_keeps_provenance() {
        let chunk = Chunk {
            id: "id".into(),
            source_id: "doc.pdf".into(),
            position: 2,
            content: "text".into(),
            token_count: 1,
            start: 1600,
            end: 2400,
            hash: "h".into(),
        };
        let ctx = Context::from(ScoredChunk { chunk, score: 0.5 });
        let pos = ctx.source_position.unwrap();
        assert_eq!(pos.source_id, "doc.pdf");
        assert_eq!(pos.position, 2);
        assert_eq!(ctx.score, Some(0.5));
    }
}
