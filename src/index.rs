//! Request-scoped exact nearest-neighbour search over chunk embeddings.

use std::cmp::Ordering;
use std::str::FromStr;

use anyhow::anyhow;
use ndarray::{Array1, Array2, ArrayView1};
use serde::Serialize;

use crate::error::{AppError, Result};

/// How vectors are compared. L2 matches a flat FAISS index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    /// Euclidean distance; smaller is closer.
    L2,
    /// Cosine similarity; larger is closer.
    Cosine,
}

impl FromStr for Distance {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Distance::L2),
            "cosine" => Ok(Distance::Cosine),
            other => Err(anyhow!("unknown distance '{other}' (expected 'l2' or 'cosine')")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// Position of the chunk in the document.
    pub position: usize,
    pub text: String,
    /// Distance for [`Distance::L2`], similarity for [`Distance::Cosine`].
    pub score: f32,
}

/// Chunks and their embeddings, one matrix row per chunk in document order.
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    chunks: Vec<String>,
    vectors: Array2<f32>,
}

impl SimilarityIndex {
    pub fn build(chunks: Vec<String>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(AppError::Index(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        let dimensions = embeddings.first().map_or(0, Vec::len);
        if let Some((position, v)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimensions)
        {
            return Err(AppError::Index(format!(
                "embedding {position} has {} dimensions, expected {dimensions}",
                v.len()
            )));
        }

        let flat: Vec<f32> = embeddings.into_iter().flatten().collect();
        let vectors = Array2::from_shape_vec((chunks.len(), dimensions), flat)
            .map_err(|e| AppError::Index(e.to_string()))?;
        Ok(Self { chunks, vectors })
    }

    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self {
            chunks: Vec::new(),
            vectors: Array2::zeros((0, 0)),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.vectors.ncols()
    }
}

/// Ranks the chunks of an index against a query vector.
pub trait VectorSearch: Send + Sync {
    /// Return at most `k` chunks, best first. Equal scores keep document order.
    fn search(&self, index: &SimilarityIndex, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Brute-force search comparing the query against every row.
#[derive(Debug, Clone, Copy)]
pub struct ExactSearch {
    distance: Distance,
}

impl ExactSearch {
    pub fn new(distance: Distance) -> Self {
        Self { distance }
    }

    fn score(&self, row: ArrayView1<f32>, query: &Array1<f32>, query_norm: f32) -> f32 {
        match self.distance {
            Distance::L2 => {
                let diff = &row - query;
                diff.dot(&diff).sqrt()
            }
            Distance::Cosine => {
                let norm = row.dot(&row).sqrt();
                if norm == 0.0 || query_norm == 0.0 {
                    0.0
                } else {
                    row.dot(query) / (norm * query_norm)
                }
            }
        }
    }

    fn compare(&self, a: f32, b: f32) -> Ordering {
        let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        match self.distance {
            Distance::L2 => ord,
            Distance::Cosine => ord.reverse(),
        }
    }
}

impl Default for ExactSearch {
    fn default() -> Self {
        Self::new(Distance::L2)
    }
}

impl VectorSearch for ExactSearch {
    fn search(&self, index: &SimilarityIndex, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != index.dimensions() {
            return Err(AppError::Index(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                index.dimensions()
            )));
        }

        let query = Array1::from_vec(query.to_vec());
        let query_norm = query.dot(&query).sqrt();
        let mut scored: Vec<(usize, f32)> = index
            .vectors
            .rows()
            .into_iter()
            .map(|row| self.score(row, &query, query_norm))
            .enumerate()
            .collect();

        // Stable sort, so ties stay in document order.
        scored.sort_by(|a, b| self.compare(a.1, b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                position,
                text: index.chunks[position].clone(),
                score,
            })
            .collect())
    }
}
