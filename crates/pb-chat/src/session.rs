//! Session controller
//!
//! Two screens: `Setup` takes an address and runs the probe, `Chat` answers
//! questions about the results. The only transition is Setup → Chat on a
//! successful probe; a failed probe leaves the controller on Setup.

use chrono::{DateTime, Utc};
use pb_core::{AppConfig, Error, Result};
use pb_llm::{EmbeddingProvider, LlmProvider};
use pb_probe::{probe_to_json, ProbeRunner, ResultEnvelope, Target};
use pb_rag::{Answer, ChunkerConfig, DocumentChunker, RetrievalConfig, RetrievalSession};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Which screen the controller is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Setup,
    Chat,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Setup => write!(f, "setup"),
            Screen::Chat => write!(f, "chat"),
        }
    }
}

/// Everything the controller needs beyond its collaborators
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub results_path: PathBuf,
    pub chunker: ChunkerConfig,
    pub retrieval: RetrievalConfig,
}

impl SessionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            results_path: config.results_path.clone(),
            chunker: ChunkerConfig {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
            },
            retrieval: RetrievalConfig::from_app_config(config),
        }
    }
}

/// State of a live chat, created by a successful probe
pub struct SessionContext {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub target: Target,
    pub results_path: PathBuf,
    pub envelope: ResultEnvelope,
    pub retrieval: RetrievalSession,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("id", &self.id)
            .field("started_at", &self.started_at)
            .field("target", &self.target)
            .field("results_path", &self.results_path)
            .field("records", &self.envelope.info.len())
            .field("turns", &self.retrieval.history().len())
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.to_string(),
            target: self.target.to_string(),
            started_at: self.started_at,
            ended_at: Utc::now(),
            records: self.envelope.info.len(),
            chunks: self.retrieval.index_len(),
            exchanges: self.retrieval.history().len() / 2,
            total_tokens: self.retrieval.total_usage().total_tokens,
        }
    }
}

/// What is logged when a session ends
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub records: usize,
    pub chunks: usize,
    pub exchanges: usize,
    pub total_tokens: u32,
}

enum SessionState {
    Setup,
    Chat(Box<SessionContext>),
}

pub struct SessionController {
    config: SessionConfig,
    chunker: DocumentChunker,
    runner: Arc<dyn ProbeRunner>,
    llm: Arc<dyn LlmProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    state: SessionState,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        runner: Arc<dyn ProbeRunner>,
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let chunker = DocumentChunker::new(config.chunker)?;
        Ok(Self {
            config,
            chunker,
            runner,
            llm,
            embedder,
            state: SessionState::Setup,
        })
    }

    pub fn screen(&self) -> Screen {
        match self.state {
            SessionState::Setup => Screen::Setup,
            SessionState::Chat(_) => Screen::Chat,
        }
    }

    pub fn context(&self) -> Option<&SessionContext> {
        match &self.state {
            SessionState::Chat(ctx) => Some(&**ctx),
            SessionState::Setup => None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Probe `input`, index the results and switch to the chat screen.
    pub async fn submit_address(&mut self, input: &str) -> Result<&SessionContext> {
        if let SessionState::Chat(ctx) = &self.state {
            return Err(Error::invalid_state(format!(
                "already chatting about {}",
                ctx.target
            )));
        }

        let target = Target::parse(input)?;
        let path = self.config.results_path.clone();

        let envelope = probe_to_json(self.runner.as_ref(), &target, &path).await?;
        let chunks = self.chunker.load_and_split(&path)?;
        let retrieval = RetrievalSession::build(
            chunks,
            Arc::clone(&self.llm),
            Arc::clone(&self.embedder),
            self.config.retrieval.clone(),
        )
        .await?;

        let ctx = SessionContext {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            target,
            results_path: path,
            envelope,
            retrieval,
        };
        info!(
            session = %ctx.id,
            target = %ctx.target,
            chunks = ctx.retrieval.index_len(),
            "Chat session started"
        );

        self.state = SessionState::Chat(Box::new(ctx));
        self.context()
            .ok_or_else(|| Error::invalid_state("session was not started"))
    }

    /// Answer a question about the probe results.
    pub async fn submit_question(&mut self, input: &str) -> Result<Answer> {
        match &mut self.state {
            SessionState::Chat(ctx) => ctx.retrieval.ask(input).await,
            SessionState::Setup => Err(Error::invalid_state(
                "no probe results yet; enter an address first",
            )),
        }
    }

    /// Tear the session down. Returns the summary if a chat was live.
    pub fn end(self) -> Option<SessionSummary> {
        match self.state {
            SessionState::Chat(ctx) => {
                let summary = ctx.summary();
                info!(
                    session = %summary.id,
                    target = %summary.target,
                    exchanges = summary.exchanges,
                    total_tokens = summary.total_tokens,
                    "Chat session ended"
                );
                Some(summary)
            }
            SessionState::Setup => {
                warn!("Session ended before any probe completed");
                None
            }
        }
    }
}
