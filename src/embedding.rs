//! Embedding providers.
//!
//! Every provider implements [`Embedder`] from the core crate and carries a
//! versioned model name; the index only compares vectors produced under the
//! same name.
//!
//! | Provider | Model name | Notes |
//! |----------|------------|-------|
//! | `hash` | `hash-v1` | deterministic, offline, default |
//! | `openai` | `openai:<model>` | needs `OPENAI_API_KEY` |
//! | `ollama` | `ollama:<model>` | `POST {url}/api/embed` |
//! | `local` | `local:<model>` | fastembed, behind `local-embeddings-fastembed` |
//!
//! Network providers make exactly one request per call. Failures surface as
//! [`IndexError::Embedding`]; nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use rag_harness_core::embedding::{Embedder, HashEmbedder};
use rag_harness_core::error::IndexError;

use crate::config::EmbeddingConfig;

/// Build the embedder selected by `[embedding] provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(config.hash_dims()))),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!(
            "Local embeddings are not available in this build. \
             Rebuild with --features local-embeddings-fastembed."
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn required<T: Clone>(value: &Option<T>, field: &str, provider: &str) -> Result<T> {
    value
        .clone()
        .ok_or_else(|| anyhow::anyhow!("embedding.{} required for {} provider", field, provider))
}

/// Send `request` and return the JSON reply, mapping every failure to
/// [`IndexError::Embedding`].
async fn post_json(
    request: reqwest::RequestBuilder,
    label: &str,
) -> Result<serde_json::Value, IndexError> {
    let response = request
        .send()
        .await
        .map_err(|e| IndexError::Embedding(format!("{} request failed: {}", label, e)))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.map_err(|e| {
            IndexError::Embedding(format!(
                "{} API error {} (body unreadable: {})",
                label, status, e
            ))
        })?;
        return Err(IndexError::Embedding(format!(
            "{} API error {}: {}",
            label, status, body
        )));
    }
    response
        .json()
        .await
        .map_err(|e| IndexError::Embedding(format!("{} returned invalid JSON: {}", label, e)))
}

/// `None` unless `value` is an array of numbers.
fn json_vector(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

// ============ OpenAI ============

pub struct OpenAIEmbedder {
    name: String,
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
        let model = required(&config.model, "model", "OpenAI")?;
        let dims = required(&config.dims, "dims", "OpenAI")?;
        Ok(Self {
            name: format!("openai:{}", model),
            model,
            dims,
            api_key,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let request = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": self.model, "input": texts }));
        let json = post_json(request, "OpenAI").await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, reordered by `data[].index` when present.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, IndexError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| IndexError::Embedding("OpenAI response missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (i, item) in data.iter().enumerate() {
        let vec = item
            .get("embedding")
            .and_then(json_vector)
            .ok_or_else(|| IndexError::Embedding("OpenAI response has a missing or non-numeric embedding".into()))?;
        let index = item
            .get("index")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(i);
        indexed.push((index, vec));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

pub struct OllamaEmbedder {
    name: String,
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = required(&config.model, "model", "Ollama")?;
        let dims = required(&config.dims, "dims", "Ollama")?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Ok(Self {
            name: format!("ollama:{}", model),
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let request = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&serde_json::json!({ "model": self.model, "input": texts }));
        let json = post_json(request, "Ollama").await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, IndexError> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| IndexError::Embedding("Ollama response missing embeddings array".into()))?
        .iter()
        .map(|e| {
            json_vector(e).ok_or_else(|| {
                IndexError::Embedding("Ollama embedding is not an array of numbers".into())
            })
        })
        .collect()
}

// ============ Local (fastembed) ============

#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    name: String,
    dims: usize,
    model: fastembed::EmbeddingModel,
    // Loaded on first embed; the download can take a while.
    loaded: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        let (model, default_dims) = fastembed_model(&model_name)?;
        Ok(Self {
            name: format!("local:{}", model_name),
            dims: config.dims.unwrap_or(default_dims),
            model,
            loaded: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn fastembed_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    use fastembed::EmbeddingModel as M;
    Ok(match name {
        "all-minilm-l6-v2" => (M::AllMiniLML6V2, 384),
        "bge-small-en-v1.5" => (M::BGESmallENV15, 384),
        "bge-base-en-v1.5" => (M::BGEBaseENV15, 768),
        "bge-large-en-v1.5" => (M::BGELargeENV15, 1024),
        "nomic-embed-text-v1.5" => (M::NomicEmbedTextV15, 768),
        "multilingual-e5-small" => (M::MultilingualE5Small, 384),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: all-minilm-l6-v2, \
             bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small",
            other
        ),
    })
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let loaded = Arc::clone(&self.loaded);
        let model = self.model.clone();
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .map_err(|_| IndexError::Embedding("local model lock poisoned".into()))?;
            if guard.is_none() {
                tracing::info!(?model, "loading local embedding model");
                let init = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model).with_show_download_progress(true),
                )
                .map_err(|e| {
                    IndexError::Embedding(format!("failed to initialize local model: {}", e))
                })?;
                *guard = Some(init);
            }
            let embedder = guard
                .as_mut()
                .ok_or_else(|| IndexError::Embedding("local model not loaded".into()))?;
            embedder
                .embed(texts, None)
                .map_err(|e| IndexError::Embedding(format!("local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| IndexError::Embedding(format!("embedding task failed: {}", e)))?
    }
}
