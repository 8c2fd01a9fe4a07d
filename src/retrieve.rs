//! `rag retrieve`: top-k contexts for a question, as JSON on stdout.

use anyhow::Result;
use serde::Serialize;

use rag_harness_core::models::Context;

use crate::config::Config;
use crate::runtime::Runtime;

/// Response shape shared by the CLI and `POST /api/retrieve`.
#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub contexts: Vec<Context>,
}

pub async fn run_retrieve(config: &Config, question: &str, k: Option<usize>) -> Result<()> {
    let runtime = Runtime::from_config(config).await?;
    let retriever = runtime.orchestrator.retriever();
    let k = k.unwrap_or_else(|| retriever.top_k());
    let contexts = retriever.retrieve_k(question, k).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&RetrieveResponse { contexts })?
    );
    Ok(())
}
