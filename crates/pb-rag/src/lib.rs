//! pb-rag: Retrieval over probe results
//!
//! - `chunker`: `{ "info": [...] }` document → overlapping text chunks
//! - `vector_store`: in-memory cosine-similarity index
//! - `history`: append-only conversation turns
//! - `prompt`: prompt templates for answering and question condensing
//! - `retrieval`: the question → context → answer loop

pub mod chunker;
pub mod history;
pub mod prompt;
pub mod retrieval;
pub mod vector_store;

pub use chunker::{Chunk, ChunkerConfig, DocumentChunker};
pub use history::{ConversationHistory, ConversationTurn};
pub use retrieval::{Answer, RetrievalConfig, RetrievalSession, SourceRef};
pub use vector_store::{InMemoryVectorStore, ScoredChunk, VectorStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::chunker::{Chunk, ChunkerConfig, DocumentChunker};
    pub use super::history::{ConversationHistory, ConversationTurn};
    pub use super::retrieval::{Answer, RetrievalConfig, RetrievalSession};
    pub use super::vector_store::{InMemoryVectorStore, VectorStore};
}
