//! Local sentence embeddings with an ONNX model loaded from disk.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use fastembed::{
    read_file_to_bytes, InitOptionsUserDefined, Pooling, TextEmbedding, TokenizerFiles,
    UserDefinedEmbeddingModel,
};

use crate::embedding::Embedder;
use crate::error::{AppError, Result};

const PROVIDER: &str = "fastembed";

/// Loads a model laid out the way Hugging Face exports it:
/// `onnx/model.onnx`, `tokenizer.json`, `config.json`,
/// `special_tokens_map.json` and `tokenizer_config.json`.
pub fn load_model(base_path: &Path) -> AnyResult<TextEmbedding> {
    let onnx_bytes = read_file_to_bytes(&base_path.join("onnx").join("model.onnx"))?;
    let tokenizer_files = TokenizerFiles {
        tokenizer_file: read_file_to_bytes(&base_path.join("tokenizer.json"))?,
        config_file: read_file_to_bytes(&base_path.join("config.json"))?,
        special_tokens_map_file: read_file_to_bytes(&base_path.join("special_tokens_map.json"))?,
        tokenizer_config_file: read_file_to_bytes(&base_path.join("tokenizer_config.json"))?,
    };

    let user_model =
        UserDefinedEmbeddingModel::new(onnx_bytes, tokenizer_files).with_pooling(Pooling::Mean);

    TextEmbedding::try_new_from_user_defined(user_model, InitOptionsUserDefined::default())
}

/// Runs inference on the blocking pool; the model is shared by all requests.
pub struct LocalEmbedder {
    model: Arc<TextEmbedding>,
}

impl LocalEmbedder {
    pub fn from_dir(base_path: impl AsRef<Path>) -> AnyResult<Self> {
        let model = load_model(base_path.as_ref())?;
        Ok(Self {
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::external(PROVIDER, "model returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|e| AppError::Internal(e.into()))?
            .map_err(|e| AppError::external(PROVIDER, e.to_string()))
    }
}
