//! SQLite-backed vector store and ingest ledger.
//!
//! [`SqliteVectorStore`] keeps every vector record as one row of the
//! `chunks` table. Search is brute force: all rows for the active model are
//! loaded in `seq` order, scored by cosine similarity, and ranked with
//! [`rank`], so equal scores keep insertion order.
//!
//! [`SqliteLedger`] persists indexed documents in `ingested_documents` and
//! tracks in-flight documents in memory; a crash mid-ingest therefore never
//! leaves a document stuck in `Processing`.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use rag_harness_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use rag_harness_core::error::{IndexError, IngestionError};
use rag_harness_core::ledger::IngestLedger;
use rag_harness_core::models::{Chunk, DocumentState, ScoredChunk, VectorRecord};
use rag_harness_core::store::{rank, VectorStore};

use crate::migrate;

fn store_err(e: sqlx::Error) -> IndexError {
    IndexError::Store(e.to_string())
}

fn ledger_err(e: sqlx::Error) -> IngestionError {
    IngestionError::Ledger(e.to_string())
}

// ============ Vector store ============

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn require_initialized(&self) -> Result<(), IndexError> {
        if self.is_initialized().await? {
            Ok(())
        } else {
            Err(IndexError::NotInitialized)
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn is_initialized(&self) -> Result<bool, IndexError> {
        migrate::is_initialized(&self.pool).await.map_err(store_err)
    }

    async fn insert(&self, record: VectorRecord) -> Result<(), IndexError> {
        self.require_initialized().await?;
        let chunk = &record.chunk;
        let blob = vec_to_blob(&record.embedding);
        sqlx::query(
            r#"
            INSERT INTO chunks (id, source_id, position, content, token_count,
                                start_offset, end_offset, hash, model, dims, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.source_id)
        .bind(chunk.position as i64)
        .bind(&chunk.content)
        .bind(chunk.token_count as i64)
        .bind(chunk.start as i64)
        .bind(chunk.end as i64)
        .bind(&chunk.hash)
        .bind(&record.model)
        .bind(record.embedding.len() as i64)
        .bind(blob)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        model: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        self.require_initialized().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, source_id, position, content, token_count,
                   start_offset, end_offset, hash, dims, embedding
            FROM chunks
            WHERE model = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(model)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let dims: i64 = row.get("dims");
            if dims as usize != query.len() {
                continue;
            }
            let blob: Vec<u8> = row.get("embedding");
            let embedding = blob_to_vec(&blob);
            let position: i64 = row.get("position");
            let token_count: i64 = row.get("token_count");
            let start: i64 = row.get("start_offset");
            let end: i64 = row.get("end_offset");
            candidates.push(ScoredChunk {
                score: cosine_similarity(query, &embedding),
                chunk: Chunk {
                    id: row.get("id"),
                    source_id: row.get("source_id"),
                    position: position as usize,
                    content: row.get("content"),
                    token_count: token_count as usize,
                    start: start as usize,
                    end: end as usize,
                    hash: row.get("hash"),
                },
            });
        }

        Ok(rank(candidates, k))
    }

    async fn len(&self, model: &str) -> Result<usize, IndexError> {
        self.require_initialized().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE model = ?")
            .bind(model)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count as usize)
    }

    async fn count_for_source(&self, source_id: &str, model: &str) -> Result<usize, IndexError> {
        self.require_initialized().await?;
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE source_id = ? AND model = ?")
                .bind(source_id)
                .bind(model)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(count as usize)
    }
}

// ============ Ledger ============

pub struct SqliteLedger {
    pool: SqlitePool,
    in_flight: Mutex<HashSet<String>>,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    async fn is_indexed(&self, document_id: &str) -> Result<bool, IngestionError> {
        if !migrate::is_initialized(&self.pool).await.map_err(ledger_err)? {
            return Err(IngestionError::Ledger(IndexError::NotInitialized.to_string()));
        }
        let found: Option<String> =
            sqlx::query_scalar("SELECT source_id FROM ingested_documents WHERE source_id = ?")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(ledger_err)?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl IngestLedger for SqliteLedger {
    async fn state(&self, document_id: &str) -> Result<DocumentState, IngestionError> {
        if self.in_flight.lock().await.contains(document_id) {
            return Ok(DocumentState::Processing);
        }
        if self.is_indexed(document_id).await? {
            Ok(DocumentState::Indexed)
        } else {
            Ok(DocumentState::Unseen)
        }
    }

    async fn try_claim(&self, document_id: &str) -> Result<bool, IngestionError> {
        // Held across the lookup so two claims cannot both pass it.
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.contains(document_id) || self.is_indexed(document_id).await? {
            return Ok(false);
        }
        in_flight.insert(document_id.to_string());
        Ok(true)
    }

    async fn mark_indexed(
        &self,
        document_id: &str,
        chunk_count: usize,
    ) -> Result<(), IngestionError> {
        sqlx::query(
            r#"
            INSERT INTO ingested_documents (source_id, chunk_count, indexed_at)
            VALUES (?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                chunk_count = excluded.chunk_count,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(document_id)
        .bind(chunk_count as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(ledger_err)?;

        self.in_flight.lock().await.remove(document_id);
        Ok(())
    }

    async fn release(&self, document_id: &str) -> Result<(), IngestionError> {
        self.in_flight.lock().await.remove(document_id);
        Ok(())
    }
}
