//! OpenAI API Client
//!
//! ## API Endpoints
//!
//! | Endpoint | URL | Purpose |
//! |----------|-----|--------|
//! | Base URL | `https://api.openai.com/v1` | All APIs |
//! | Chat | `/chat/completions` | Chat completions |
//! | Embeddings | `/embeddings` | Text embeddings |
//!
//! ## Authentication
//! - Header: `Authorization: Bearer {OPENAI_API_KEY}`

use async_trait::async_trait;
use pb_core::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::provider::{
    ChatMessage, ChatRequest, ChatResponse, EmbeddingProvider, LlmProvider, Role, TokenUsage,
};

// =============================================================================
// API ENDPOINT CONFIGURATION
// =============================================================================

pub mod endpoints {
    pub const BASE_URL: &str = "https://api.openai.com/v1";
    pub const CHAT_COMPLETIONS: &str = "/chat/completions";
    pub const EMBEDDINGS: &str = "/embeddings";
}

const PROVIDER: &str = "openai";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
/// Inputs per embeddings request
const EMBEDDING_BATCH: usize = 1000;
/// Error bodies are cut to this many characters in error messages
const MAX_ERROR_BODY: usize = 500;

// =============================================================================
// DATA STRUCTURES
// =============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

// =============================================================================
// CLIENT IMPLEMENTATION
// =============================================================================

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_url: String,
    embedding_model: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_url: endpoints::BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    /// Build from `OPENAI_API_KEY` (and `OPENAI_BASE_URL` when set)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config("OPENAI_API_KEY environment variable not set"))?;
        let mut client = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            if !url.trim().is_empty() {
                client = client.with_base_url(url);
            }
        }
        Ok(client)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<String> {
        let url = format!("{}{}", self.api_url, path);
        debug!("OpenAI request to: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::external_service(PROVIDER, format!("request to {} failed: {}", path, e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            Error::external_service(PROVIDER, format!("failed to read {} response: {}", path, e))
        })?;

        if !status.is_success() {
            return Err(Error::external_service(
                PROVIDER,
                format!("{} returned HTTP {}: {}", path, status, truncate(&text)),
            ));
        }
        Ok(text)
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input: batch,
        };
        let text = self.post_json(endpoints::EMBEDDINGS, &body).await?;
        parse_embedding_response(&text, batch.len())
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", cut)
    }
}

fn parse_completion_response(text: &str, requested_model: &str) -> Result<ChatResponse> {
    let result: CompletionResponse = serde_json::from_str(text).map_err(|e| {
        Error::external_service(PROVIDER, format!("failed to parse completion response: {}", e))
    })?;

    let choice = result
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::external_service(PROVIDER, "completion response has no choices"))?;

    let content = choice
        .message
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| Error::external_service(PROVIDER, "completion response contained no text"))?;

    Ok(ChatResponse {
        message: ChatMessage {
            role: Role::Assistant,
            content,
        },
        model: result.model.unwrap_or_else(|| requested_model.to_string()),
        provider: PROVIDER.to_string(),
        finish_reason: choice.finish_reason,
        usage: result.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

fn parse_embedding_response(text: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut result: EmbeddingResponse = serde_json::from_str(text).map_err(|e| {
        Error::external_service(PROVIDER, format!("failed to parse embedding response: {}", e))
    })?;

    if result.data.len() != expected {
        return Err(Error::external_service(
            PROVIDER,
            format!(
                "embedding response has {} vectors for {} inputs",
                result.data.len(),
                expected
            ),
        ));
    }

    // The API does not promise ordering; `index` does.
    result.data.sort_by_key(|d| d.index);
    if result.data.iter().enumerate().any(|(i, d)| d.index != i) {
        return Err(Error::external_service(
            PROVIDER,
            "embedding response indices do not match inputs",
        ));
    }
    if result.data.iter().any(|d| d.embedding.is_empty()) {
        return Err(Error::external_service(PROVIDER, "embedding response has an empty vector"));
    }

    Ok(result.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn chat_with_request(&self, model: &str, request: ChatRequest) -> Result<ChatResponse> {
        info!(
            "OpenAI chat: model={}, endpoint={}, messages={}",
            model,
            self.api_url,
            request.messages.len()
        );

        let body = CompletionRequest {
            model,
            messages: &request.messages,
            temperature: request.temperature,
        };
        let text = self.post_json(endpoints::CHAT_COMPLETIONS, &body).await?;
        parse_completion_response(&text, model)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBEDDING_BATCH) {
            debug!(
                "OpenAI embeddings: model={}, batch={}",
                self.embedding_model,
                batch.len()
            );
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}
