//! HTTP plumbing shared by the OpenAI embedding and completion providers.

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::OpenAiConfig;
use crate::error::{AppError, Result};

pub(crate) const PROVIDER: &str = "OpenAI";

/// A client for an OpenAI-compatible REST API.
///
/// The API key is optional so the server can start without one; every call
/// made without a key fails with [`AppError::ExternalService`].
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Token accounting returned with every successful response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        })
    }

    pub(crate) async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::external(PROVIDER, "OPENAI_API_KEY is not set"))?;
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, %url, error = %e, "request failed");
                AppError::external(PROVIDER, format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = PROVIDER, %url, %status, "API error");
            return Err(AppError::external(
                PROVIDER,
                format!("API returned {status}: {detail}"),
            ));
        }

        response.json::<Resp>().await.map_err(|e| {
            error!(provider = PROVIDER, %url, error = %e, "failed to parse response");
            AppError::external(PROVIDER, format!("failed to parse response: {e}"))
        })
    }
}
