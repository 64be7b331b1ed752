//! In-memory vector index
//!
//! Brute-force cosine similarity over every stored vector. The probe
//! envelope yields a handful of chunks, so nothing smarter is needed.

use pb_core::{Error, Result};
use serde::Serialize;

use crate::chunker::Chunk;

/// A search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Vector index over chunks
pub trait VectorStore: Send + Sync {
    /// Add chunks with their embeddings (same length, same order).
    fn add(&mut self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<()>;

    /// The `k` chunks most similar to `query`, best first.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);
}

#[derive(Debug, Clone)]
struct Entry {
    chunk: Chunk,
    embedding: Vec<f32>,
    norm: f32,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryVectorStore {
    entries: Vec<Entry>,
    dimension: Option<usize>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

fn check_dimension(expected: Option<usize>, len: usize) -> Result<()> {
    if len == 0 {
        return Err(Error::vector_index("embedding vector is empty"));
    }
    match expected {
        Some(dim) if dim != len => Err(Error::vector_index(format!(
            "embedding has {} dimensions, index expects {}",
            len, dim
        ))),
        _ => Ok(()),
    }
}

impl VectorStore for InMemoryVectorStore {
    fn add(&mut self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(Error::vector_index(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        // Validate the whole batch before touching the index
        let dimension = self.dimension.or_else(|| embeddings.first().map(Vec::len));
        for embedding in &embeddings {
            check_dimension(dimension, embedding.len())?;
        }

        self.dimension = dimension;
        self.entries.extend(
            chunks
                .into_iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| Entry {
                    norm: norm(&embedding),
                    chunk,
                    embedding,
                }),
        );
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        check_dimension(self.dimension, query.len())?;

        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine(query, query_norm, &e.embedding, e.norm)))
            .collect();

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.dimension = None;
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Zero vectors score 0 against everything.
fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}
