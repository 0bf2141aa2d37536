use std::sync::Arc;

use anyhow::{Context, Result};
use ask_pdf::completion::OpenAiCompleter;
use ask_pdf::config::{Config, EmbedderKind};
use ask_pdf::embedding::{Embedder, OpenAiEmbedder};
use ask_pdf::index::ExactSearch;
use ask_pdf::openai::OpenAiClient;
use ask_pdf::splitter::Chunker;
use ask_pdf::{router, AppState, AskPdfPipeline};
use tracing_subscriber::EnvFilter;

/// Log level used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter(log_filter()).init();

    let config = Config::load()?;
    if config.openai.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; embedding and completion calls will fail");
    }

    let openai = Arc::new(OpenAiClient::new(&config.openai)?);
    let embedder = build_embedder(&config, Arc::clone(&openai))?;
    let completer = Arc::new(OpenAiCompleter::new(
        openai,
        config.openai.completion_model.clone(),
        config.openai.temperature,
        config.openai.max_tokens,
    ));

    let pipeline = AskPdfPipeline::new(
        Chunker::new(config.chunker)?,
        embedder,
        Arc::new(ExactSearch::new(config.distance)),
        completer,
        config.top_k,
    );
    let state = Arc::new(AppState { pipeline });
    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(
        addr = %config.bind_addr,
        embedder = ?config.embedder,
        top_k = config.top_k,
        "server running"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn build_embedder(config: &Config, openai: Arc<OpenAiClient>) -> Result<Arc<dyn Embedder>> {
    match config.embedder {
        EmbedderKind::OpenAi => Ok(Arc::new(OpenAiEmbedder::new(
            openai,
            config.openai.embedding_model.clone(),
            config.openai.embedding_batch_size,
        ))),
        #[cfg(feature = "fastembed")]
        EmbedderKind::FastEmbed => {
            let embedder = ask_pdf::local_embedding::LocalEmbedder::from_dir(&config.fastembed_model_dir)
                .with_context(|| format!("failed to load model from {}", config.fastembed_model_dir))?;
            Ok(Arc::new(embedder))
        }
        #[cfg(not(feature = "fastembed"))]
        EmbedderKind::FastEmbed => {
            anyhow::bail!("EMBEDDER=fastembed requires building with the `fastembed` feature")
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}
