//! # RAG Harness
//!
//! Retrieval-augmented question answering: documents are chunked, embedded
//! and stored in SQLite; questions retrieve the most similar chunks, which
//! are rendered into a prompt and sent to a remote completion service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────┐
//! │ Uploads      │──▶│ Ingest pipeline  │──▶│  SQLite  │
//! │ files / HTTP │   │ load+chunk+embed │   │ vectors  │
//! └──────────────┘   └──────────────────┘   └────┬─────┘
//!                                                │
//!       question ──▶ Retriever ──▶ Prompt ──▶ Generation service ──▶ answer
//! ```
//!
//! The pipeline logic lives in [`rag_harness_core`]; this crate supplies the
//! storage, network clients, and CLI/HTTP surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite vector store and ingest ledger |
//! | [`embedding`] | Embedding providers (hash, OpenAI, Ollama, fastembed) |
//! | [`generation`] | HTTP client for the completion service |
//! | [`loader`] | PDF / UTF-8 document loading |
//! | [`ingest`] | Streaming ingestion pipeline and `rag ingest` |
//! | [`progress`] | Progress rendering on stderr |
//! | [`runtime`] | Component wiring from config |
//! | [`retrieve`] | `rag retrieve` |
//! | [`ask`] | `rag ask` |
//! | [`server`] | HTTP API |

pub mod ask;
pub mod config;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod ingest;
pub mod loader;
pub mod migrate;
pub mod progress;
pub mod retrieve;
pub mod runtime;
pub mod server;
pub mod sqlite_store;

pub use rag_harness_core;
