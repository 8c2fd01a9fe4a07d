//! # RAG Harness Core
//!
//! Transport-independent logic for retrieval-augmented question answering:
//! data models, chunking, the embedding index and its store abstraction,
//! retrieval, prompt assembly, the generation boundary, and answer
//! orchestration.
//!
//! This crate contains no tokio runtime, sqlx, HTTP client, or filesystem
//! I/O. Storage, network embedders, and the generation client are supplied
//! by the application through the [`store::VectorStore`],
//! [`embedding::Embedder`], and [`generate::Generator`] traits.
//!
//! ```text
//! write path:  Document ─▶ chunk ─▶ EmbeddingIndex::embed_and_insert
//! read path:   question ─▶ Retriever ─▶ PromptAssembler ─▶ Generator ─▶ Answer
//! ```

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod index;
pub mod ledger;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod store;
