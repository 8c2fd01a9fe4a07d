//! Sliding-window text chunker.
//!
//! Splits document text into overlapping [`Chunk`]s of `chunk_size`
//! units. Consecutive windows advance by `chunk_size - overlap` units, so
//! every chunk after the first repeats the trailing `overlap` units of its
//! predecessor. A unit is either a character (default) or a
//! whitespace-delimited token.
//!
//! Each chunk receives a deterministic UUID derived from its source id and
//! position, plus a SHA-256 hash of its text. Identical input and
//! parameters always produce byte-identical chunks.
//!
//! # Algorithm
//!
//! 1. Split the text into unit spans (byte ranges).
//! 2. Emit the window `[start, min(start + chunk_size, n))`.
//! 3. Stop once a window reaches the last unit, otherwise advance `start`
//!    by `chunk_size - overlap` and repeat.
//!
//! The final window may be shorter than `chunk_size` but is never empty.
//! Empty text yields no chunks.
//!
//! # Example
//!
//! ```rust
//! use rag_harness_core::chunk::chunk;
//!
//! let text = "a".repeat(2400);
//! let chunks = chunk("doc.txt", &text, 1000, 200).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[2].start, 1600);
//! ```

use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ConfigurationError;
use crate::models::Chunk;

/// Approximate characters-per-token ratio used for `token_count`.
pub const CHARS_PER_TOKEN: usize = 4;

/// What a chunking window counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkUnit {
    /// Unicode scalar values.
    #[default]
    Chars,
    /// Whitespace-delimited tokens. Chunk text spans from the first token's
    /// start to the last token's end, inner whitespace preserved.
    Tokens,
}

/// Validated window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    chunk_size: usize,
    overlap: usize,
    unit: ChunkUnit,
}

impl ChunkingParams {
    /// Fails unless `0 <= overlap < chunk_size`.
    pub fn new(
        chunk_size: usize,
        overlap: usize,
        unit: ChunkUnit,
    ) -> Result<Self, ConfigurationError> {
        if chunk_size == 0 {
            return Err(ConfigurationError::new("chunk_size must be > 0"));
        }
        if overlap >= chunk_size {
            return Err(ConfigurationError::new(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
            unit,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn unit(&self) -> ChunkUnit {
        self.unit
    }

    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Chunk `text` by characters with the given window size and overlap.
pub fn chunk(
    source_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ConfigurationError> {
    let params = ChunkingParams::new(chunk_size, overlap, ChunkUnit::Chars)?;
    Ok(chunk_text(source_id, text, &params))
}

/// Split text into overlapping windows described by `params`.
///
/// Returns chunks with contiguous positions starting at 0.
pub fn chunk_text(source_id: &str, text: &str, params: &ChunkingParams) -> Vec<Chunk> {
    let spans = unit_spans(text, params.unit);
    let n = spans.len();
    let mut chunks = Vec::new();
    if n == 0 {
        return chunks;
    }

    let mut start = 0;
    loop {
        let end = (start + params.chunk_size).min(n);
        let content = &text[spans[start].0..spans[end - 1].1];
        chunks.push(make_chunk(source_id, chunks.len(), content, start, end));
        if end == n {
            break;
        }
        start += params.step();
    }

    chunks
}

/// Estimate tokens for a piece of text (`ceil(chars / 4)`).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Byte ranges of each unit in `text`.
fn unit_spans(text: &str, unit: ChunkUnit) -> Vec<(usize, usize)> {
    match unit {
        ChunkUnit::Chars => text
            .char_indices()
            .map(|(i, c)| (i, i + c.len_utf8()))
            .collect(),
        ChunkUnit::Tokens => {
            let mut spans = Vec::new();
            let mut token_start: Option<usize> = None;
            for (i, c) in text.char_indices() {
                match (c.is_whitespace(), token_start) {
                    (true, Some(s)) => {
                        spans.push((s, i));
                        token_start = None;
                    }
                    (false, None) => token_start = Some(i),
                    _ => {}
                }
            }
            if let Some(s) = token_start {
                spans.push((s, text.len()));
            }
            spans
        }
    }
}

/// Create a single [`Chunk`] with a deterministic id and SHA-256 hash.
fn make_chunk(source_id: &str, position: usize, text: &str, start: usize, end: usize) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let name = format!("{}:{}:{}", source_id, position, hash);
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string();

    Chunk {
        id,
        source_id: source_id.to_string(),
        position,
        content: text.to_string(),
        token_count: estimate_tokens(text),
        start,
        end,
        hash,
    }
}
