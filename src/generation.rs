//! HTTP client for the remote text-generation service.
//!
//! Sends `POST {url}/generate` with `{"prompt": ..., "max_new_tokens": ...}`
//! and reads `generated_text` from the JSON reply. One request per prompt,
//! bounded by `[generation] timeout_secs`, never retried.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rag_harness_core::error::GenerationError;
use rag_harness_core::generate::Generator;
use rag_harness_core::models::{Answer, Prompt};

use crate::config::GenerationConfig;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_new_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    generated_text: Option<String>,
}

pub struct HttpGenerator {
    endpoint: String,
    timeout_secs: u64,
    max_new_tokens: Option<u32>,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: format!("{}/generate", config.url.trim_end_matches('/')),
            timeout_secs: config.timeout_secs,
            max_new_tokens: config.max_new_tokens,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<Answer, GenerationError> {
        let body = GenerateRequest {
            prompt: prompt.as_str(),
            max_new_tokens: self.max_new_tokens,
        };

        tracing::debug!(endpoint = %self.endpoint, prompt_len = prompt.as_str().len(), "calling generation service");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.timeout_secs)
                } else {
                    GenerationError::Transport(format!(
                        "failed to read body of {} response: {}",
                        status.as_u16(),
                        e
                    ))
                }
            })?;
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;

        parsed
            .generated_text
            .map(Answer::new)
            .ok_or_else(|| GenerationError::InvalidResponse("missing generated_text".to_string()))
    }
}

impl HttpGenerator {
    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout_secs)
        } else if e.is_decode() {
            GenerationError::InvalidResponse(e.to_string())
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}
