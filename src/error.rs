//! Error type shared by every stage of the `/ask-pdf` pipeline.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Message returned when the multipart form lacks the `pdf` file or the `question` field.
pub const MISSING_FIELDS_MESSAGE: &str = "PDF file and question are required";

/// Errors that can end a request.
#[derive(Debug, Error)]
pub enum AppError {
    /// The request did not carry the required form fields, or its body could not be decoded.
    #[error("{0}")]
    Validation(String),

    /// The request body exceeded the upload limit.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// The uploaded bytes are not a readable PDF.
    #[error("failed to parse PDF: {0}")]
    DocumentParse(String),

    /// An embedding or completion provider failed (auth, network, quota, bad response).
    #[error("{provider} error: {message}")]
    ExternalService {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The similarity index was given inconsistent vectors.
    #[error("similarity index error: {0}")]
    Index(String),

    /// Anything else. The detail is logged but never sent to the caller.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn missing_fields() -> Self {
        AppError::Validation(MISSING_FIELDS_MESSAGE.to_string())
    }

    pub fn external(provider: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ExternalService {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DocumentParse(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ExternalService { .. } | AppError::Index(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message placed in the JSON body.
    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        } else {
            tracing::warn!(%status, error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_parse_errors_are_client_errors() {
        assert_eq!(AppError::missing_fields().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::DocumentParse("bad xref".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn provider_failures_keep_their_message() {
        let err = AppError::external("OpenAI", "API returned 401 Unauthorized: Incorrect API key");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.public_message(),
            "OpenAI error: API returned 401 Unauthorized: Incorrect API key"
        );
    }

    #[test]
    fn internal_errors_are_redacted() {
        let err = AppError::from(anyhow::anyhow!("worker thread panicked at src/extractor.rs"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "internal server error");
    }
}
