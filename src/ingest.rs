//! Ingestion pipeline: uploads → documents → chunks → vector records.
//!
//! [`IngestPipeline::ingest`] spawns a task that processes a batch of
//! uploads strictly in request order and returns an [`IngestStream`] of
//! [`ProgressEvent`]s. Each document produces its own sub-sequence ending in
//! exactly one `complete` or `error` event.
//!
//! # Per-document algorithm
//!
//! 1. Claim the identifier in the ledger. Already indexed → a single
//!    `complete` event with zero chunks. Still being ingested by another
//!    request → a single `error` event; that request keeps its claim.
//! 2. Load the bytes into text (PDF or UTF-8) on the blocking pool.
//! 3. Chunk, then embed and insert one chunk at a time, emitting a
//!    `processing` event after each insertion.
//! 4. Mark the identifier indexed and emit `complete`.
//!
//! Any failure, including a panic while loading or indexing, emits one
//! `error` event, releases the claim and moves on to the next document.
//! Inserted chunks are not rolled back.
//!
//! Progress delivery is best-effort: if the subscriber goes away the task
//! keeps ingesting until the batch is done.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use futures::{FutureExt, Stream};
use tokio::sync::mpsc;
use walkdir::WalkDir;

use rag_harness_core::chunk::{chunk_text, ChunkingParams};
use rag_harness_core::error::IngestionError;
use rag_harness_core::index::EmbeddingIndex;
use rag_harness_core::ledger::IngestLedger;
use rag_harness_core::models::{Document, DocumentState, ProgressEvent, ProgressStatus};

use crate::config::Config;
use crate::loader::load_document;
use crate::progress::ProgressMode;
use crate::runtime::Runtime;

const EVENT_BUFFER: usize = 64;

/// Turns an upload's name and bytes into a [`Document`]. Called on the
/// blocking pool.
pub type Loader = Arc<dyn Fn(&str, &[u8]) -> Result<Document, IngestionError> + Send + Sync>;

/// A named upload awaiting ingestion.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

enum Source {
    Bytes(Vec<u8>),
    Text(String),
}

/// Single-use stream of progress events for one ingestion request.
pub struct IngestStream {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl IngestStream {
    /// Next event, or `None` once every document has finished.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Drain the stream, waiting for the batch to finish.
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }

    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        futures::stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }
}

#[derive(Clone)]
pub struct IngestPipeline {
    index: EmbeddingIndex,
    ledger: Arc<dyn IngestLedger>,
    params: ChunkingParams,
    loader: Loader,
}

impl IngestPipeline {
    pub fn new(index: EmbeddingIndex, ledger: Arc<dyn IngestLedger>, params: ChunkingParams) -> Self {
        let loader: Loader = Arc::new(load_document);
        Self {
            index,
            ledger,
            params,
            loader,
        }
    }

    /// Replace the default PDF/UTF-8 loader.
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    pub fn ledger(&self) -> &Arc<dyn IngestLedger> {
        &self.ledger
    }

    /// Start ingesting `uploads` in order. Must be called inside a tokio runtime.
    pub fn ingest(&self, uploads: Vec<Upload>) -> IngestStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pipeline = self.clone();
        tokio::spawn(async move {
            for Upload { name, bytes } in uploads {
                pipeline.process(&name, Source::Bytes(bytes), &tx).await;
            }
        });
        IngestStream { rx }
    }

    /// Start ingesting a single already-loaded document.
    pub fn ingest_document(&self, document: Document) -> IngestStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pipeline = self.clone();
        tokio::spawn(async move {
            let Document { id, content } = document;
            pipeline.process(&id, Source::Text(content), &tx).await;
        });
        IngestStream { rx }
    }

    async fn process(&self, document_id: &str, source: Source, tx: &mpsc::Sender<ProgressEvent>) {
        match self.ledger.try_claim(document_id).await {
            Ok(true) => {}
            Ok(false) => {
                self.report_unclaimed(document_id, tx).await;
                return;
            }
            Err(e) => {
                tracing::warn!(document = document_id, error = %e, "ledger lookup failed");
                emit(tx, ProgressEvent::error(document_id, 0, 0, e.to_string())).await;
                return;
            }
        }

        let outcome = AssertUnwindSafe(self.index_claimed(document_id, source, tx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err((
                    0,
                    0,
                    IngestionError::Panicked {
                        name: document_id.to_string(),
                        reason: panic_message(panic.as_ref()),
                    },
                ))
            });

        match outcome {
            Ok(total) => {
                tracing::info!(document = document_id, chunks = total, "document indexed");
                emit(tx, ProgressEvent::complete(document_id, total, total)).await;
            }
            Err((processed, total, e)) => {
                tracing::warn!(document = document_id, error = %e, "ingestion failed");
                if let Err(release_err) = self.ledger.release(document_id).await {
                    tracing::warn!(document = document_id, error = %release_err, "failed to release claim");
                }
                emit(
                    tx,
                    ProgressEvent::error(document_id, processed, total, e.to_string()),
                )
                .await;
            }
        }
    }

    /// Claim refused: `complete` only when the document really is indexed.
    async fn report_unclaimed(&self, document_id: &str, tx: &mpsc::Sender<ProgressEvent>) {
        let event = match self.ledger.state(document_id).await {
            Ok(DocumentState::Processing) => {
                tracing::warn!(document = document_id, "already being ingested");
                ProgressEvent::error(
                    document_id,
                    0,
                    0,
                    format!("{} is already being ingested", document_id),
                )
            }
            Ok(_) => {
                tracing::info!(document = document_id, "already ingested, skipping");
                ProgressEvent::complete(document_id, 0, 0)
            }
            Err(e) => ProgressEvent::error(document_id, 0, 0, e.to_string()),
        };
        emit(tx, event).await;
    }

    /// Chunk and insert a claimed document. On failure returns how far it got.
    async fn index_claimed(
        &self,
        document_id: &str,
        source: Source,
        tx: &mpsc::Sender<ProgressEvent>,
    ) -> Result<usize, (usize, usize, IngestionError)> {
        let text = match source {
            Source::Text(text) => text,
            Source::Bytes(bytes) => self.load(document_id, bytes).await.map_err(|e| (0, 0, e))?,
        };
        let chunks = chunk_text(document_id, &text, &self.params);
        let total = chunks.len();
        tracing::debug!(document = document_id, chunks = total, "chunked document");

        for (processed, chunk) in chunks.into_iter().enumerate() {
            let position = chunk.position;
            self.index.embed_and_insert(chunk).await.map_err(|source| {
                (
                    processed,
                    total,
                    IngestionError::Insert {
                        source_id: document_id.to_string(),
                        position,
                        source,
                    },
                )
            })?;
            emit(tx, ProgressEvent::processing(document_id, processed + 1, total)).await;
        }

        self.ledger
            .mark_indexed(document_id, total)
            .await
            .map_err(|e| (total, total, e))?;
        Ok(total)
    }

    async fn load(&self, name: &str, bytes: Vec<u8>) -> Result<String, IngestionError> {
        let loader = Arc::clone(&self.loader);
        let owned_name = name.to_string();
        let joined = tokio::task::spawn_blocking(move || loader(&owned_name, &bytes)).await;
        let document = joined.map_err(|e| IngestionError::Load {
            name: name.to_string(),
            reason: if e.is_panic() {
                format!("loader panicked: {}", panic_message(e.into_panic().as_ref()))
            } else {
                e.to_string()
            },
        })??;
        Ok(document.content)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn emit(tx: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
    // A closed channel means the subscriber left; keep working regardless.
    let _ = tx.send(event).await;
}

// ============ CLI ============

/// Expand files and directories into a de-duplicated file list. Directory
/// contents are visited in file-name order.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            bail!("Path not found: {}", path.display());
        }
        if path.is_file() {
            if seen.insert(path.clone()) {
                files.push(path.clone());
            }
            continue;
        }
        for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("Failed to walk directory: {}", path.display()))?;
            if entry.file_type().is_file() && seen.insert(entry.path().to_path_buf()) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

fn upload_name(path: &Path) -> String {
    path.display().to_string()
}

pub async fn run_ingest(config: &Config, paths: &[PathBuf], mode: ProgressMode) -> Result<()> {
    let files = collect_files(paths)?;
    let mut uploads = Vec::with_capacity(files.len());
    for file in &files {
        let bytes = std::fs::read(file)
            .with_context(|| format!("Failed to read file: {}", file.display()))?;
        uploads.push(Upload::new(upload_name(file), bytes));
    }

    if !config.ingest.persist_ledger {
        tracing::warn!(
            "persist_ledger is off: files ingested by an earlier run are not \
             recognized and will be indexed again"
        );
    }

    let runtime = Runtime::from_config(config).await?;
    let reporter = mode.reporter();
    let mut stream = runtime.pipeline.ingest(uploads);

    let mut completed = 0usize;
    let mut failed = 0usize;
    let mut chunks_written = 0usize;
    while let Some(event) = stream.next().await {
        reporter.report(&event);
        match event.status {
            ProgressStatus::Complete => {
                completed += 1;
                chunks_written += event.chunks_processed;
            }
            ProgressStatus::Error => failed += 1,
            ProgressStatus::Processing => {}
        }
    }

    println!("ingest");
    println!("  documents: {}", files.len());
    println!("  completed: {}", completed);
    println!("  failed: {}", failed);
    println!("  chunks written: {}", chunks_written);

    if failed > 0 {
        bail!("{} document(s) failed to ingest", failed);
    }
    println!("ok");
    Ok(())
}
