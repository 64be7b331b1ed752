//! Prompt templates

use crate::history::ConversationHistory;
use crate::vector_store::ScoredChunk;

/// System prompt for answering; `{context}` receives the retrieved chunks.
pub const QA_SYSTEM_TEMPLATE: &str = "Use the following pieces of context to answer the user's question. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n\
{context}";

/// Rewrites a follow-up into a standalone question.
pub const CONDENSE_QUESTION_TEMPLATE: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.\n\n\
Chat History:\n\
{chat_history}\n\
Follow Up Input: {question}\n\
Standalone question:";

/// Separator between retrieved chunks in the context block
pub const CONTEXT_SEPARATOR: &str = "\n\n";

pub fn format_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn qa_system_prompt(hits: &[ScoredChunk]) -> String {
    QA_SYSTEM_TEMPLATE.replace("{context}", &format_context(hits))
}

pub fn condense_prompt(history: &ConversationHistory, question: &str) -> String {
    CONDENSE_QUESTION_TEMPLATE
        .replace("{chat_history}", &history.transcript())
        .replace("{question}", question)
}
