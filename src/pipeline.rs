//! The ask-a-PDF pipeline: extract → chunk → embed → index → retrieve → complete.

use std::sync::Arc;

use axum::body::Bytes;
use tracing::{debug, info, instrument};

use crate::completion::Completer;
use crate::embedding::Embedder;
use crate::error::{AppError, Result};
use crate::extractor;
use crate::index::{ScoredChunk, SimilarityIndex, VectorSearch};
use crate::splitter::Chunker;

/// The synthesized answer and the chunks it was conditioned on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub response: String,
    pub retrieved: Vec<ScoredChunk>,
}

pub struct AskPdfPipeline {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    search: Arc<dyn VectorSearch>,
    completer: Arc<dyn Completer>,
    top_k: usize,
}

impl AskPdfPipeline {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        search: Arc<dyn VectorSearch>,
        completer: Arc<dyn Completer>,
        top_k: usize,
    ) -> Self {
        Self {
            chunker,
            embedder,
            search,
            completer,
            top_k,
        }
    }

    /// Run the whole pipeline for one uploaded PDF.
    #[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4(), pdf_bytes = pdf.len()))]
    pub async fn answer(&self, pdf: Bytes, question: &str) -> Result<Answer> {
        let text = tokio::task::spawn_blocking(move || extractor::extract_text(&pdf))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;
        self.answer_text(&text, question).await
    }

    /// Everything after extraction.
    pub async fn answer_text(&self, text: &str, question: &str) -> Result<Answer> {
        let chunks = self.chunker.split(text);
        debug!(chunks = chunks.len(), text_chars = text.chars().count(), "chunked document");

        let retrieved = self.retrieve(chunks, question).await?;
        let context: Vec<String> = retrieved.iter().map(|c| c.text.clone()).collect();
        if context.is_empty() {
            info!("document has no extractable text; answering without context");
        }

        let response = self.completer.complete(&context, question).await?;
        info!(retrieved = retrieved.len(), answer_chars = response.len(), "answered question");
        Ok(Answer {
            response,
            retrieved,
        })
    }

    /// Embed the chunks, index them, and return the `top_k` closest to the question.
    ///
    /// Nothing is embedded when there are no chunks.
    pub async fn retrieve(&self, chunks: Vec<String>, question: &str) -> Result<Vec<ScoredChunk>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed_batch(&chunks).await?;
        let index = SimilarityIndex::build(chunks, embeddings)?;
        let query = self.embedder.embed(question).await?;
        let retrieved = self.search.search(&index, &query, self.top_k)?;
        debug!(
            indexed = index.len(),
            dimensions = index.dimensions(),
            retrieved = retrieved.len(),
            "retrieved chunks"
        );
        Ok(retrieved)
    }
}
