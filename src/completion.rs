use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::openai::{OpenAiClient, Usage, PROVIDER};

const STUFF_PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Put every retrieved chunk into one prompt, separated by blank lines.
pub fn stuff_prompt(context: &[String], question: &str) -> String {
    format!(
        "{STUFF_PROMPT_PREAMBLE}\n\n{}\n\nQuestion: {question}\nHelpful Answer:",
        context.join("\n\n")
    )
}

/// Answers a question from supporting context with a language model.
#[async_trait]
pub trait Completer: Send + Sync {
    /// `context` may be empty, in which case the model should say it cannot answer.
    async fn complete(&self, context: &[String], question: &str) -> Result<String>;
}

/// Text completion through the OpenAI `/completions` endpoint.
pub struct OpenAiCompleter {
    client: Arc<OpenAiClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

impl OpenAiCompleter {
    pub fn new(
        client: Arc<OpenAiClient>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    async fn complete(&self, context: &[String], question: &str) -> Result<String> {
        let prompt = stuff_prompt(context, question);
        debug!(
            provider = PROVIDER,
            model = %self.model,
            context_chunks = context.len(),
            prompt_chars = prompt.len(),
            "requesting completion"
        );

        let request = CompletionRequest {
            model: &self.model,
            prompt: &prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let response: CompletionResponse = self.client.post("completions", &request).await?;

        info!(
            provider = PROVIDER,
            model = %self.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            total_tokens = response.usage.total_tokens,
            "completion usage"
        );

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| AppError::external(PROVIDER, "API returned no completion choices"))
    }
}
