//! Builds the pipeline components from a [`Config`].
//!
//! Every CLI command and the HTTP server construct their own [`Runtime`];
//! the index, ledger and generator are passed around as explicit handles.

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use rag_harness_core::answer::AnswerOrchestrator;
use rag_harness_core::index::EmbeddingIndex;
use rag_harness_core::ledger::{IngestLedger, MemoryLedger};
use rag_harness_core::retrieve::Retriever;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::generation::HttpGenerator;
use crate::ingest::IngestPipeline;
use crate::sqlite_store::{SqliteLedger, SqliteVectorStore};

#[derive(Clone)]
pub struct Runtime {
    pub pool: SqlitePool,
    pub index: EmbeddingIndex,
    pub pipeline: IngestPipeline,
    pub orchestrator: AnswerOrchestrator,
}

impl Runtime {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        let embedder = create_embedder(&config.embedding)?;
        let store = Arc::new(SqliteVectorStore::new(pool.clone()));
        let index = EmbeddingIndex::new(embedder, store);

        let ledger: Arc<dyn IngestLedger> = if config.ingest.persist_ledger {
            Arc::new(SqliteLedger::new(pool.clone()))
        } else {
            Arc::new(MemoryLedger::new())
        };
        let pipeline = IngestPipeline::new(index.clone(), ledger, config.chunking.params()?);

        let retriever = Retriever::new(index.clone(), config.retrieval.top_k)?;
        let generator = Arc::new(HttpGenerator::new(&config.generation)?);
        let orchestrator =
            AnswerOrchestrator::new(retriever, config.prompt.assembler()?, generator);

        tracing::debug!(
            model = index.model_name(),
            persist_ledger = config.ingest.persist_ledger,
            "runtime ready"
        );

        Ok(Self {
            pool,
            index,
            pipeline,
            orchestrator,
        })
    }
}
