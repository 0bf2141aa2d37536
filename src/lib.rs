//! Answer questions about an uploaded PDF with retrieval-augmented generation.
//!
//! `POST /ask-pdf` takes a multipart form with a `pdf` file and a `question`
//! field. The PDF's text is chunked, embedded and indexed for that request
//! only; the chunks closest to the question are handed to a language model,
//! whose answer is returned as `{"response": "..."}`.

pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod index;
#[cfg(feature = "fastembed")]
pub mod local_embedding;
pub mod openai;
pub mod pipeline;
pub mod routes;
pub mod splitter;

pub use error::{AppError, MISSING_FIELDS_MESSAGE};
pub use pipeline::{Answer, AskPdfPipeline};
pub use routes::{router, AppState};
