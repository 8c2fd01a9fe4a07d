//! HTTP server for ingestion, retrieval and answering.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ingest` | Ingest documents; streams NDJSON progress events |
//! | `POST` | `/api/retrieve` | Top-k contexts for a question |
//! | `POST` | `/api/answer` | Answer a question (optionally from supplied contexts) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_initialized", "message": "index not initialized" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_initialized` (503),
//! `generation_failed` (502, message is the upstream body), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser upload pages
//! can call the API directly.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use rag_harness_core::error::{AnswerError, GenerationError, IndexError};
use rag_harness_core::models::{Answer, Context};

use crate::config::Config;
use crate::ingest::Upload;
use crate::retrieve::RetrieveResponse;
use crate::runtime::Runtime;

#[derive(Clone)]
struct AppState {
    runtime: Runtime,
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let runtime = Runtime::from_config(config).await?;
    let bind_addr = config.server.bind.clone();

    let app = build_router(runtime);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "server listening");
    println!("RAG server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Router with all routes and CORS, backed by `runtime`.
pub fn build_router(runtime: Runtime) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ingest", post(handle_ingest))
        .route("/api/retrieve", post(handle_retrieve))
        .route("/api/answer", post(handle_answer))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { runtime })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotInitialized => AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "not_initialized",
                message: err.to_string(),
            },
            other => internal(other.to_string()),
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        let message = match err {
            GenerationError::Status { body, .. } => body,
            other => other.to_string(),
        };
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "generation_failed",
            message,
        }
    }
}

impl From<AnswerError> for AppError {
    fn from(err: AnswerError) -> Self {
        match err {
            AnswerError::Retrieval(e) => e.into(),
            AnswerError::Generation(e) => e.into(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    documents: Vec<IngestDocument>,
}

/// One upload: text in `content`, or raw bytes (e.g. a PDF) in `content_base64`.
#[derive(Deserialize)]
struct IngestDocument {
    name: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    content_base64: Option<String>,
}

fn to_upload(doc: IngestDocument) -> Result<Upload, AppError> {
    if doc.name.trim().is_empty() {
        return Err(bad_request("document name must not be empty"));
    }
    let bytes = match (doc.content, doc.content_base64) {
        (Some(text), None) => text.into_bytes(),
        (None, Some(encoded)) => base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| bad_request(format!("{}: invalid content_base64: {}", doc.name, e)))?,
        _ => {
            return Err(bad_request(format!(
                "{}: exactly one of content or content_base64 is required",
                doc.name
            )))
        }
    };
    Ok(Upload::new(doc.name, bytes))
}

/// Streams one JSON progress event per line as documents are processed.
async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Response, AppError> {
    let uploads = req
        .documents
        .into_iter()
        .map(to_upload)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(documents = uploads.len(), "ingest request");

    let events = state.runtime.pipeline.ingest(uploads).into_stream();
    let lines = events.map(|event| {
        serde_json::to_string(&event).map(|mut line| {
            line.push('\n');
            line
        })
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(lines))
        .map_err(|e| internal(e.to_string()))
}

// ============ POST /api/retrieve ============

#[derive(Deserialize)]
struct RetrieveRequest {
    question: String,
    #[serde(default)]
    k: Option<usize>,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    Json(req): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    if req.k == Some(0) {
        return Err(bad_request("k must be >= 1"));
    }

    let retriever = state.runtime.orchestrator.retriever();
    let k = req.k.unwrap_or_else(|| retriever.top_k());
    let contexts = retriever.retrieve_k(&req.question, k).await?;
    Ok(Json(RetrieveResponse { contexts }))
}

// ============ POST /api/answer ============

#[derive(Deserialize)]
struct AnswerRequest {
    question: String,
    /// When present, retrieval is skipped and these contexts are used as-is.
    #[serde(default)]
    contexts: Option<Vec<Context>>,
}

async fn handle_answer(
    State(state): State<AppState>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<Answer>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let orchestrator = &state.runtime.orchestrator;
    let answer = match req.contexts {
        Some(contexts) => {
            orchestrator
                .answer_with_contexts(&req.question, &contexts)
                .await?
        }
        None => orchestrator.answer(&req.question).await?,
    };
    Ok(Json(answer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, content: Option<&str>, b64: Option<&str>) -> IngestDocument {
        IngestDocument {
            name: name.to_string(),
            content: content.map(String::from),
            content_base64: b64.map(String::from),
        }
    }

    #[test]
    fn test_upload_from_text() {
        let upload = to_upload(doc("a.txt", Some("hello"), None)).ok().unwrap();
        assert_eq!(upload.name, "a.txt");
        assert_eq!(upload.bytes, b"hello");
    }

    #[test]
    fn test_upload_from_base64() {
        let upload = to_upload(doc("a.pdf", None, Some("aGVsbG8="))).ok().unwrap();
        assert_eq!(upload.bytes, b"hello");
    }

    #[test]
    fn test_upload_requires_exactly_one_payload() {
        let err = to_upload(doc("a.txt", None, None)).err().unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let err = to_upload(doc("a.txt", Some("x"), Some("eA=="))).err().unwrap();
        assert_eq!(err.code, "bad_request");
    }

    #[test]
    fn test_not_initialized_maps_to_503() {
        let err: AppError = IndexError::NotInitialized.into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, "not_initialized");
    }

    #[test]
    fn test_generation_status_keeps_upstream_body() {
        let err: AppError = AnswerError::Generation(GenerationError::Status {
            status: 500,
            body: "CUDA out of memory".to_string(),
        })
        .into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.message, "CUDA out of memory");
    }
}
