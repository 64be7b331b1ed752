//! Retrieval-augmented conversation
//!
//! A `RetrievalSession` owns the vector index built from one chunk set and
//! the conversation history. Each `ask` embeds the question, pulls the top-k
//! chunks, and sends them as system context together with the full history.
//! History is only extended once a non-empty answer is in hand.

use pb_core::{AppConfig, Error, Result};
use pb_llm::{ChatMessage, ChatRequest, EmbeddingProvider, LlmProvider, TokenUsage};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::chunker::Chunk;
use crate::history::ConversationHistory;
use crate::prompt;
use crate::vector_store::{InMemoryVectorStore, ScoredChunk, VectorStore};

/// Chunk texts sent per embedding call while building the index
pub const EMBED_BATCH_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    pub chat_model: String,
    pub top_k: usize,
    pub temperature: f32,
    /// Rephrase follow-ups into standalone questions before retrieval
    pub condense_question: bool,
}

impl RetrievalConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            chat_model: config.chat_model.clone(),
            top_k: config.top_k,
            temperature: config.temperature,
            condense_question: config.condense_question,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

/// Where a piece of context came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub source: String,
    pub unit_index: usize,
    pub chunk_index: usize,
    pub seq: usize,
    pub score: f32,
}

impl From<&ScoredChunk> for SourceRef {
    fn from(hit: &ScoredChunk) -> Self {
        Self {
            source: hit.chunk.source.clone(),
            unit_index: hit.chunk.unit_index,
            chunk_index: hit.chunk.chunk_index,
            seq: hit.chunk.seq,
            score: hit.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Question used for retrieval (the input itself unless condensed)
    pub standalone_question: String,
    pub sources: Vec<SourceRef>,
    pub usage: Option<TokenUsage>,
}

pub struct RetrievalSession {
    config: RetrievalConfig,
    llm: Arc<dyn LlmProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: InMemoryVectorStore,
    history: ConversationHistory,
    usage: TokenUsage,
}

impl RetrievalSession {
    /// Embed every chunk and load a fresh index.
    pub async fn build(
        chunks: Vec<Chunk>,
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::parse("document produced no chunks to index"));
        }
        if config.top_k == 0 {
            return Err(Error::config("top_k must be at least 1"));
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed_documents(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(Error::external_service(
                    embedder.name(),
                    format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
                ));
            }
            if vectors.iter().any(Vec::is_empty) {
                return Err(Error::external_service(
                    embedder.name(),
                    "embedding provider returned an empty vector",
                ));
            }
            embeddings.extend(vectors);
        }

        let count = chunks.len();
        let mut index = InMemoryVectorStore::new();
        index.add(chunks, embeddings)?;

        info!(
            chunks = count,
            embedder = embedder.name(),
            model = %config.chat_model,
            "Retrieval index built"
        );

        Ok(Self {
            config,
            llm,
            embedder,
            index,
            history: ConversationHistory::new(),
            usage: TokenUsage::default(),
        })
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Tokens reported across every successful call in this session
    pub fn total_usage(&self) -> TokenUsage {
        self.usage
    }

    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::user_input("Please enter a question."));
        }

        let mut usage: Option<TokenUsage> = None;

        let standalone = if self.config.condense_question && !self.history.is_empty() {
            let (rephrased, condense_usage) = self.condense(question).await?;
            merge_usage(&mut usage, condense_usage);
            rephrased
        } else {
            question.to_string()
        };

        let query = self.embedder.embed_query(&standalone).await?;
        let hits = self.index.search(&query, self.config.top_k)?;
        debug!(k = self.config.top_k, hits = hits.len(), "Retrieved context");

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(prompt::qa_system_prompt(&hits)));
        messages.extend(self.history.to_messages());
        messages.push(ChatMessage::user(question));

        let response = self
            .llm
            .chat_with_request(
                &self.config.chat_model,
                ChatRequest::new(messages).with_temperature(self.config.temperature),
            )
            .await?;
        let text = response.message.content.trim().to_string();
        if text.is_empty() {
            return Err(Error::external_service(
                self.llm.name(),
                "completion contained no answer",
            ));
        }
        merge_usage(&mut usage, response.usage);

        self.history.push_exchange(question, text.clone());
        if let Some(u) = &usage {
            self.usage.add(u);
        }

        Ok(Answer {
            text,
            standalone_question: standalone,
            sources: hits.iter().map(SourceRef::from).collect(),
            usage,
        })
    }

    async fn condense(&self, question: &str) -> Result<(String, Option<TokenUsage>)> {
        let request = ChatRequest::new(vec![ChatMessage::user(prompt::condense_prompt(
            &self.history,
            question,
        ))])
        .with_temperature(self.config.temperature);

        let response = self
            .llm
            .chat_with_request(&self.config.chat_model, request)
            .await?;
        let rephrased = response.message.content.trim().to_string();
        if rephrased.is_empty() {
            return Err(Error::external_service(
                self.llm.name(),
                "condensed question was empty",
            ));
        }
        debug!(standalone = %rephrased, "Condensed follow-up question");
        Ok((rephrased, response.usage))
    }
}

fn merge_usage(total: &mut Option<TokenUsage>, next: Option<TokenUsage>) {
    if let Some(next) = next {
        total.get_or_insert_with(TokenUsage::default).add(&next);
    }
}
