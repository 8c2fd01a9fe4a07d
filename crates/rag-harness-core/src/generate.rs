//! Generation boundary.
//!
//! The remote text-generation service is reached through the
//! [`Generator`] trait: one request per prompt, one typed answer or one
//! typed error. Implementations must not retry and must never substitute
//! a default answer on failure.

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::models::{Answer, Prompt};

/// Sends a prompt to a completion service.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<Answer, GenerationError>;
}
