//! Answer orchestration: retrieve → assemble → generate → shape.
//!
//! Each stage's output is the next stage's only input. A failing stage
//! aborts the rest of the request. Zero retrieved contexts is not a
//! failure: generation still runs with an empty context section and the
//! model's own reply is returned.

use std::sync::Arc;

use crate::error::AnswerError;
use crate::generate::Generator;
use crate::models::{Answer, Context};
use crate::prompt::PromptAssembler;
use crate::retrieve::Retriever;

/// Marker preceding the assistant turn in chat-formatted completions.
pub const ASSISTANT_MARKER: &str = "<|assistant|>";

/// Runs the read path for a question, independent of transport.
#[derive(Clone)]
pub struct AnswerOrchestrator {
    retriever: Retriever,
    assembler: PromptAssembler,
    generator: Arc<dyn Generator>,
}

impl AnswerOrchestrator {
    pub fn new(
        retriever: Retriever,
        assembler: PromptAssembler,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            retriever,
            assembler,
            generator,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `question` from the index's current contents.
    pub async fn answer(&self, question: &str) -> Result<Answer, AnswerError> {
        let contexts = self.retriever.retrieve(question).await?;
        tracing::debug!(contexts = contexts.len(), "answering question");
        self.answer_with_contexts(question, &contexts).await
    }

    /// Answer `question` from caller-supplied contexts, skipping retrieval.
    pub async fn answer_with_contexts(
        &self,
        question: &str,
        contexts: &[Context],
    ) -> Result<Answer, AnswerError> {
        let prompt = self.assembler.assemble(question, contexts);
        let answer = self.generator.generate(&prompt).await.map_err(|e| {
            tracing::warn!(error = %e, "generation failed");
            e
        })?;
        Ok(shape_answer(answer))
    }
}

/// Keep only the text after the last assistant marker, trimmed.
pub fn shape_answer(answer: Answer) -> Answer {
    let text = answer
        .answer
        .rsplit(ASSISTANT_MARKER)
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    Answer::new(text)
}
