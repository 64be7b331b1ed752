//! pb-llm: Language-model and embedding providers
//!
//! ## Supported Providers & Endpoints
//!
//! | Provider | Base URL | Auth Method |
//! |----------|----------|-------------|
//! | OpenAI (and compatible servers) | `https://api.openai.com/v1` | `Bearer {OPENAI_API_KEY}` |
//!
//! ## Environment Variables
//!
//! ```bash
//! OPENAI_API_KEY=sk-xxx                       # required
//! OPENAI_BASE_URL=https://api.openai.com/v1   # optional, for compatible servers
//! ```

pub mod openai;
pub mod provider;

pub use openai::OpenAiClient;
pub use provider::{
    ChatMessage, ChatRequest, ChatResponse, EmbeddingProvider, LlmProvider, Role, TokenUsage,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::openai::OpenAiClient;
    pub use super::provider::{
        ChatMessage, ChatRequest, ChatResponse, EmbeddingProvider, LlmProvider, Role, TokenUsage,
    };
}
