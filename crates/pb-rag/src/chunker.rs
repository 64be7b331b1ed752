//! Document chunker
//!
//! Every element of the document's `info` array is one logical unit. Each
//! unit's text is cut into windows of at most `chunk_size` characters that
//! advance by `chunk_size - chunk_overlap`, so neighbours share exactly
//! `chunk_overlap` characters. Lengths count Unicode scalar values.

use pb_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Top-level key holding the logical units
pub const UNITS_KEY: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// A bounded-length text fragment with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Document the chunk came from
    pub source: String,
    /// Position of the unit in the `info` array
    pub unit_index: usize,
    /// Position of the chunk within its unit
    pub chunk_index: usize,
    /// Position in the whole chunk sequence
    pub seq: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct DocumentChunker {
    config: ChunkerConfig,
}

impl DocumentChunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::config("chunk size must be at least 1"));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(Error::config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Read `path` and return the elements of its `info` array.
    pub fn load_units(path: &Path) -> Result<Vec<Value>> {
        let content = fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&content)
            .map_err(|e| Error::parse(format!("{} is not valid JSON: {}", path.display(), e)))?;
        extract_units(document)
            .map_err(|msg| Error::parse(format!("{}: {}", path.display(), msg)))
    }

    /// Load `path` and split every unit into chunks.
    pub fn load_and_split(&self, path: &Path) -> Result<Vec<Chunk>> {
        let units = Self::load_units(path)?;
        let chunks = self.chunk_units(&path.display().to_string(), &units);
        debug!(
            path = %path.display(),
            units = units.len(),
            chunks = chunks.len(),
            "Document split"
        );
        Ok(chunks)
    }

    /// Split already-extracted units, tagging chunks with `source`.
    pub fn chunk_units(&self, source: &str, units: &[Value]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (unit_index, unit) in units.iter().enumerate() {
            for (chunk_index, text) in self.split_text(&unit_text(unit)).into_iter().enumerate() {
                chunks.push(Chunk {
                    source: source.to_string(),
                    unit_index,
                    chunk_index,
                    seq: chunks.len(),
                    text,
                });
            }
        }
        chunks
    }

    /// Cut `text` into overlapping windows. Empty text yields no windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let size = self.config.chunk_size;
        let step = size - self.config.chunk_overlap;

        let mut windows = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + size).min(chars.len());
            windows.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        windows
    }
}

fn extract_units(document: Value) -> std::result::Result<Vec<Value>, String> {
    match document {
        Value::Object(mut map) => match map.remove(UNITS_KEY) {
            Some(Value::Array(units)) => Ok(units),
            Some(_) => Err(format!("'{}' is not an array", UNITS_KEY)),
            None => Err(format!("missing '{}' key", UNITS_KEY)),
        },
        _ => Err("document is not a JSON object".to_string()),
    }
}

/// Strings are used as-is; anything else as compact JSON.
fn unit_text(unit: &Value) -> String {
    match unit {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
