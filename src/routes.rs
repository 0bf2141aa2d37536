use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, Result};
use crate::pipeline::AskPdfPipeline;

pub struct AppState {
    pub pipeline: AskPdfPipeline,
}

#[derive(Debug, Serialize)]
pub struct AskPdfResponse {
    pub response: String,
}

/// The validated contents of an `/ask-pdf` form.
#[derive(Debug)]
pub struct AskPdfForm {
    pub pdf: Bytes,
    pub question: String,
}

impl AskPdfForm {
    /// Read the `pdf` and `question` fields; both must be present and non-empty.
    /// Other fields are ignored, and the first occurrence of a repeated field wins.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut pdf: Option<Bytes> = None;
        let mut question: Option<String> = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("pdf") if pdf.is_none() => {
                    pdf = Some(field.bytes().await.map_err(multipart_error)?);
                }
                Some("question") if question.is_none() => {
                    question = Some(field.text().await.map_err(multipart_error)?);
                }
                _ => {}
            }
        }

        match (pdf, question) {
            (Some(pdf), Some(question)) if !pdf.is_empty() && !question.trim().is_empty() => {
                Ok(Self { pdf, question })
            }
            _ => Err(AppError::missing_fields()),
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(e.body_text())
    }
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/ask-pdf", post(ask_pdf))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ask_pdf(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<AskPdfResponse>> {
    // Anything that is not a multipart form cannot carry the required fields.
    let multipart = multipart.map_err(|_| AppError::missing_fields())?;
    let form = AskPdfForm::from_multipart(multipart).await?;
    let answer = state.pipeline.answer(form.pdf, &form.question).await?;
    Ok(Json(AskPdfResponse {
        response: answer.response,
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
