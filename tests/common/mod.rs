#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ask_pdf::completion::Completer;
use ask_pdf::embedding::Embedder;
use ask_pdf::error::{AppError, Result};
use ask_pdf::index::ExactSearch;
use ask_pdf::splitter::{Chunker, ChunkerConfig};
use ask_pdf::{router, AppState, AskPdfPipeline};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

pub const BOUNDARY: &str = "ask-pdf-test-boundary";

/// A PDF with one page per entry in `pages`, each line drawn with `Tj`.
pub fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
    save(document_with_pages(pages))
}

/// A one-page PDF whose trailer declares standard password security.
pub fn encrypted_pdf() -> Vec<u8> {
    let mut doc = document_with_pages(&[&["Top secret."]]);
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "Length" => 40,
        "P" => -4,
        "O" => Object::string_literal(vec![0u8; 32]),
        "U" => Object::string_literal(vec![0u8; 32]),
    });
    doc.trailer.set("Encrypt", encrypt_id);
    save(doc)
}

fn document_with_pages(pages: &[&[&str]]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for line in lines.iter() {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

pub enum Part<'a> {
    File(&'a str, &'a [u8]),
    Text(&'a str, &'a str),
}

pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File(name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"upload.pdf\"\r\n\
                         Content-Type: application/pdf\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn ask_pdf_request(parts: &[Part]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/ask-pdf")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Hashes each lowercase word into one of 1024 buckets, then L2-normalizes.
#[derive(Default)]
pub struct BagOfWordsEmbedder {
    pub calls: AtomicUsize,
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; 1024];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
            % 1024;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(text))
    }
}

/// Fails every call the way OpenAI rejects a bad key.
pub struct UnauthorizedEmbedder;

pub const AUTH_FAILURE: &str = "API returned 401 Unauthorized: Incorrect API key provided";

#[async_trait]
impl Embedder for UnauthorizedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AppError::external("OpenAI", AUTH_FAILURE))
    }
}

/// Records every call and answers by quoting its context.
#[derive(Default)]
pub struct RecordingCompleter {
    pub calls: Mutex<Vec<(Vec<String>, String)>>,
}

#[async_trait]
impl Completer for RecordingCompleter {
    async fn complete(&self, context: &[String], question: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((context.to_vec(), question.to_string()));
        if context.is_empty() {
            Ok("I don't know; the document has no readable content.".to_string())
        } else {
            Ok(format!("According to the document: {}", context.join(" ")))
        }
    }
}

pub struct FailingCompleter;

#[async_trait]
impl Completer for FailingCompleter {
    async fn complete(&self, _context: &[String], _question: &str) -> Result<String> {
        Err(AppError::external("OpenAI", "request failed: operation timed out"))
    }
}

pub fn pipeline(embedder: Arc<dyn Embedder>, completer: Arc<dyn Completer>) -> AskPdfPipeline {
    AskPdfPipeline::new(
        Chunker::new(ChunkerConfig::default()).unwrap(),
        embedder,
        Arc::new(ExactSearch::default()),
        completer,
        4,
    )
}

pub fn app(embedder: Arc<dyn Embedder>, completer: Arc<dyn Completer>) -> Router {
    app_with_limit(embedder, completer, 16 * 1024 * 1024)
}

pub fn app_with_limit(
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    max_upload_bytes: usize,
) -> Router {
    let state = Arc::new(AppState {
        pipeline: pipeline(embedder, completer),
    });
    router(state, max_upload_bytes)
}
