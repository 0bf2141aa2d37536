//! Process-wide configuration, read once at startup from `.env` and the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use crate::index::Distance;
use crate::splitter::ChunkerConfig;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";
pub const DEFAULT_TOP_K: usize = 4;

/// Which embedding backend the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    OpenAi,
    /// Local ONNX model, only usable when built with the `fastembed` feature.
    FastEmbed,
}

impl FromStr for EmbedderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(EmbedderKind::OpenAi),
            "fastembed" => Ok(EmbedderKind::FastEmbed),
            other => Err(anyhow!("unknown embedder '{other}' (expected 'openai' or 'fastembed')")),
        }
    }
}

/// Settings for the OpenAI-compatible HTTP provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    /// `None` when `OPENAI_API_KEY` is unset; provider calls then fail per request.
    pub api_key: Option<String>,
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub completion_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Option<Duration>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_batch_size: 1000,
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 256,
            request_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    pub chunker: ChunkerConfig,
    pub top_k: usize,
    pub distance: Distance,
    pub embedder: EmbedderKind,
    pub fastembed_model_dir: String,
    pub openai: OpenAiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            max_upload_bytes: 16 * 1024 * 1024,
            chunker: ChunkerConfig::default(),
            top_k: DEFAULT_TOP_K,
            distance: Distance::L2,
            embedder: EmbedderKind::OpenAi,
            fastembed_model_dir: "all-MiniLM-L6-v2".to_string(),
            openai: OpenAiConfig::default(),
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read the configuration from the process environment.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let chunker = ChunkerConfig {
            chunk_size: parse_or(&get, "CHUNK_SIZE", defaults.chunker.chunk_size)?,
            chunk_overlap: parse_or(&get, "CHUNK_OVERLAP", defaults.chunker.chunk_overlap)?,
        };
        chunker.validate()?;

        let top_k = parse_or(&get, "TOP_K", defaults.top_k)?;
        if top_k == 0 {
            bail!("TOP_K must be greater than zero");
        }

        let embedding_batch_size = parse_or(
            &get,
            "EMBEDDING_BATCH_SIZE",
            defaults.openai.embedding_batch_size,
        )?;
        if embedding_batch_size == 0 {
            bail!("EMBEDDING_BATCH_SIZE must be greater than zero");
        }

        let request_timeout = get("REQUEST_TIMEOUT_SECS")
            .map(|v| {
                v.trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("invalid REQUEST_TIMEOUT_SECS '{v}'"))
            })
            .transpose()?;

        let openai = OpenAiConfig {
            api_key: get("OPENAI_API_KEY"),
            base_url: get("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai.base_url),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or(defaults.openai.embedding_model),
            embedding_batch_size,
            completion_model: get("COMPLETION_MODEL").unwrap_or(defaults.openai.completion_model),
            temperature: parse_or(&get, "COMPLETION_TEMPERATURE", defaults.openai.temperature)?,
            max_tokens: parse_or(&get, "COMPLETION_MAX_TOKENS", defaults.openai.max_tokens)?,
            request_timeout,
        };

        Ok(Config {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            chunker,
            top_k,
            distance: parse_or(&get, "DISTANCE", defaults.distance)?,
            embedder: parse_or(&get, "EMBEDDER", defaults.embedder)?,
            fastembed_model_dir: get("FASTEMBED_MODEL_DIR").unwrap_or(defaults.fastembed_model_dir),
            openai,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid {key} '{raw}': {e}")),
        None => Ok(default),
    }
}
