//! Prompt assembly from a fixed instruction template.
//!
//! The template has two placeholders, `{question}` and `{context}`. The
//! context section is the retrieved contents in retrieval order, each
//! labelled `Context N:` and separated by a blank line so the model can
//! tell them apart. Placeholders are substituted in a single pass over the
//! template; text inside the question or the contexts is never expanded.
//!
//! With a context budget set, contexts are dropped from the end of the list
//! (the lowest-similarity end) until the rest fit. The question is never
//! truncated.

use crate::chunk::estimate_tokens;
use crate::error::ConfigurationError;
use crate::models::{Context, Prompt};

const QUESTION: &str = "{question}";
const CONTEXT: &str = "{context}";

/// Phi-3 style chat template used by default.
pub const DEFAULT_TEMPLATE: &str = "<|system|>\n\
You are an assistant for question-answering tasks. Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. Use three sentences maximum and keep the answer concise.<|end|>\n\
<|user|>\n\
Question: {question}\n\
Contexts:\n\
{context}<|end|>\n\
<|assistant|>";

/// Renders prompts. Pure: identical inputs produce identical output.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    template: String,
    max_context_tokens: Option<usize>,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            max_context_tokens: None,
        }
    }
}

impl PromptAssembler {
    /// Use a custom template. It must contain both placeholders.
    pub fn with_template(template: impl Into<String>) -> Result<Self, ConfigurationError> {
        let template = template.into();
        for placeholder in [QUESTION, CONTEXT] {
            if !template.contains(placeholder) {
                return Err(ConfigurationError::new(format!(
                    "prompt template is missing the {} placeholder",
                    placeholder
                )));
            }
        }
        Ok(Self {
            template,
            max_context_tokens: None,
        })
    }

    /// Limit the estimated tokens spent on contexts.
    pub fn with_context_budget(mut self, max_context_tokens: Option<usize>) -> Self {
        self.max_context_tokens = max_context_tokens;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the template for `question` and `contexts`.
    pub fn assemble(&self, question: &str, contexts: &[Context]) -> Prompt {
        let kept = self.fit_budget(contexts);
        if kept < contexts.len() {
            tracing::debug!(
                dropped = contexts.len() - kept,
                "contexts dropped to fit the context budget"
            );
        }
        let context = format_contexts(&contexts[..kept]);
        Prompt::new(render(&self.template, question, &context))
    }

    /// Number of leading contexts that fit the budget.
    fn fit_budget(&self, contexts: &[Context]) -> usize {
        let Some(budget) = self.max_context_tokens else {
            return contexts.len();
        };
        let mut used = 0;
        for (i, ctx) in contexts.iter().enumerate() {
            used += estimate_tokens(&ctx.content);
            if used > budget {
                return i;
            }
        }
        contexts.len()
    }
}

/// Join contexts as `Context N:\n<content>` blocks separated by a blank line.
pub fn format_contexts(contexts: &[Context]) -> String {
    contexts
        .iter()
        .enumerate()
        .map(|(i, ctx)| format!("Context {}:\n{}", i + 1, ctx.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render(template: &str, question: &str, context: &str) -> String {
    let mut out = String::with_capacity(template.len() + question.len() + context.len());
    let mut rest = template;
    loop {
        let next = [(QUESTION, question), (CONTEXT, context)]
            .into_iter()
            .filter_map(|(placeholder, value)| {
                rest.find(placeholder).map(|at| (at, placeholder, value))
            })
            .min_by_key(|(at, _, _)| *at);
        match next {
            Some((at, placeholder, value)) => {
                out.push_str(&rest[..at]);
                out.push_str(value);
                rest = &rest[at + placeholder.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(content: &str) -> Context {
        Context {
            content: content.to_string(),
            source_position: None,
            token_count: estimate_tokens(content),
            score: None,
        }
    }

    #[test]
    fn assemble_is_pure() {
        let a = PromptAssembler::default();
        let contexts = vec![ctx("one"), ctx("two")];
        assert_eq!(a.assemble("q?", &contexts), a.assemble("q?", &contexts));
    }

    #[test]
    fn contexts_keep_order_and_boundaries() {
        let prompt = PromptAssembler::default().assemble("What is X?", &[ctx("first"), ctx("second")]);
        let text = prompt.as_str();
        assert!(text.contains("Question: What is X?\n"));
        assert!(text.contains("Contexts:\nContext 1:\nfirst\n\nContext 2:\nsecond<|end|>"));
        assert!(text.ends_with("<|assistant|>"));
    }

    #[test]
    fn empty_contexts_render_empty_section() {
        let prompt = PromptAssembler::default().assemble("What is X?", &[]);
        assert!(prompt.as_str().contains("Contexts:\n<|end|>"));
    }

    #[test]
    fn placeholders_in_inputs_are_not_expanded() {
        let prompt = PromptAssembler::with_template("Q={question} C={context}")
            .unwrap()
            .assemble("{context}", &[ctx("{question}")]);
        assert_eq!(prompt.as_str(), "Q={context} C=Context 1:\n{question}");
    }

    #[test]
    fn template_must_have_placeholders() {
        assert!(PromptAssembler::with_template("only {question}").is_err());
        assert!(PromptAssembler::with_template("only {context}").is_err());
    }

    #[test]
    fn budget_drops_lowest_similarity_contexts_first() {
        let assembler = PromptAssembler::default().with_context_budget(Some(5));
        let contexts = vec![ctx("aaaaaaaa"), ctx("bbbbbbbb"), ctx("cccccccc")];
        let text = assembler.assemble("a long question that is never cut", &contexts);
        let text = text.as_str();
        assert!(text.contains("aaaaaaaa"));
        assert!(text.contains("bbbbbbbb"));
        assert!(!text.contains("cccccccc"));
        assert!(text.contains("a long question that is never cut"));
    }

    #[test]
    fn zero_budget_keeps_question_only() {
        let assembler = PromptAssembler::default().with_context_budget(Some(0));
        let prompt = assembler.assemble("q", &[ctx("anything")]);
        assert!(!prompt.as_str().contains("anything"));
        assert!(prompt.as_str().contains("Question: q"));
    }
}
