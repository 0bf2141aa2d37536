use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::openai::{OpenAiClient, Usage, PROVIDER};

/// Turns text into fixed-dimension vectors.
///
/// `embed_batch` must return exactly one vector per input, in input order.
/// The default implementation embeds one text at a time.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Embeddings from the OpenAI `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>, batch_size: usize) -> Self {
        Self {
            client,
            model: model.into(),
            batch_size: batch_size.max(1),
        }
    }

    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!(provider = PROVIDER, model = %self.model, batch_size = texts.len(), "embedding batch");
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let mut response: EmbeddingResponse = self.client.post("embeddings", &request).await?;
        if response.data.len() != texts.len() {
            return Err(AppError::external(
                PROVIDER,
                format!(
                    "expected {} embeddings, API returned {}",
                    texts.len(),
                    response.data.len()
                ),
            ));
        }
        info!(
            provider = PROVIDER,
            model = %self.model,
            prompt_tokens = response.usage.prompt_tokens,
            total_tokens = response.usage.total_tokens,
            "embedding usage"
        );
        response.data.sort_by_key(|d| d.index);
        // Every input position must come back exactly once.
        if let Some((position, data)) = response
            .data
            .iter()
            .enumerate()
            .find(|(position, d)| d.index != *position)
        {
            return Err(AppError::external(
                PROVIDER,
                format!(
                    "embedding indices do not cover the inputs: expected index {position}, got {}",
                    data.index
                ),
            ));
        }
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::external(PROVIDER, "API returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_request(batch).await?);
        }
        Ok(vectors)
    }
}
