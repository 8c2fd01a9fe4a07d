//! TOML configuration.
//!
//! Every section except `[db]` has defaults, so a minimal file only names
//! the database path. [`load_config`] validates all sections before any
//! component is built.

use anyhow::{Context, Result};
use rag_harness_core::chunk::{ChunkUnit, ChunkingParams};
use rag_harness_core::embedding::HASH_DEFAULT_DIMS;
use rag_harness_core::prompt::PromptAssembler;
use rag_harness_core::retrieve::DEFAULT_TOP_K;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default)]
    pub unit: ChunkUnit,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            unit: ChunkUnit::default(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkingParams> {
        Ok(ChunkingParams::new(self.chunk_size, self.overlap, self.unit)?)
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn hash_dims(&self) -> usize {
        self.dims.unwrap_or(HASH_DEFAULT_DIMS)
    }
}

fn default_provider() -> String {
    "hash".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Base URL; requests go to `{url}/generate`.
    #[serde(default = "default_generation_url")]
    pub url: String,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_new_tokens: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_generation_url(),
            timeout_secs: default_generation_timeout_secs(),
            max_new_tokens: None,
        }
    }
}

fn default_generation_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptConfig {
    #[serde(default)]
    pub max_context_tokens: Option<usize>,
    #[serde(default)]
    pub template: Option<String>,
}

impl PromptConfig {
    pub fn assembler(&self) -> Result<PromptAssembler> {
        let assembler = match &self.template {
            Some(t) => PromptAssembler::with_template(t.clone())?,
            None => PromptAssembler::default(),
        };
        Ok(assembler.with_context_budget(self.max_context_tokens))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Keep ingested identifiers in SQLite so a restart still treats a
    /// re-upload as a duplicate. With `false`, dedup only lasts for the
    /// life of one process.
    #[serde(default = "default_persist_ledger")]
    pub persist_ledger: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            persist_ledger: default_persist_ledger(),
        }
    }
}

fn default_persist_ledger() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5001".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    config
        .chunking
        .params()
        .with_context(|| "Invalid [chunking] section")?;

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "hash" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    if config.generation.url.trim().is_empty() {
        anyhow::bail!("generation.url must not be empty");
    }
    if config.generation.timeout_secs == 0 {
        anyhow::bail!("generation.timeout_secs must be > 0");
    }

    config
        .prompt
        .assembler()
        .with_context(|| "Invalid [prompt] section")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = parse_config("[db]\npath = \"data/rag.sqlite\"\n").unwrap();
        assert_eq!(cfg.chunking.chunk_size, 1000);
        assert_eq!(cfg.chunking.overlap, 200);
        assert_eq!(cfg.chunking.unit, ChunkUnit::Chars);
        assert_eq!(cfg.retrieval.top_k, 4);
        assert_eq!(cfg.embedding.provider, "hash");
        assert_eq!(cfg.generation.url, "http://localhost:5000");
        assert_eq!(cfg.generation.timeout_secs, 120);
        assert!(cfg.ingest.persist_ledger);
        assert_eq!(cfg.server.bind, "127.0.0.1:5001");
    }

    #[test]
    fn overlap_not_below_chunk_size_is_rejected() {
        let err = parse_config(
            "[db]\npath = \"x\"\n[chunking]\nchunk_size = 100\noverlap = 100\n",
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("overlap"));
    }

    #[test]
    fn token_unit_parses() {
        let cfg =
            parse_config("[db]\npath = \"x\"\n[chunking]\nunit = \"tokens\"\nchunk_size = 50\noverlap = 5\n")
                .unwrap();
        assert_eq!(cfg.chunking.unit, ChunkUnit::Tokens);
    }

    #[test]
    fn network_provider_requires_model_and_dims() {
        assert!(parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse_config(
            "[db]\npath = \"x\"\n[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n"
        )
        .is_ok());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"magic\"\n").is_err());
    }

    #[test]
    fn example_config_parses() {
        let cfg = parse_config(include_str!("../config/rag.example.toml")).unwrap();
        assert_eq!(cfg.retrieval.top_k, 4);
        assert_eq!(cfg.embedding.provider, "hash");
    }

    #[test]
    fn template_without_placeholders_is_rejected() {
        assert!(parse_config("[db]\npath = \"x\"\n[prompt]\ntemplate = \"no slots\"\n").is_err());
    }
}
