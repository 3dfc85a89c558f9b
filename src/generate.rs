//! Response Generator.
//!
//! Assembles `[System("Context: ..."), ...history, User(query)]`, invokes the
//! language model once and wraps the reply in a [`ChatResponse`] with a fresh
//! random id. The context message is omitted when retrieval finds nothing.

use std::sync::Arc;

use tracing::info;

use crate::error::{RagError, Result};
use crate::llm::LanguageModel;
use crate::models::{ChatQuery, ChatResponse, ConversationMessage};
use crate::retrieve::Retriever;
use crate::summary::ConversationSummary;

pub struct ResponseGenerator {
    retriever: Retriever,
    model: Arc<dyn LanguageModel>,
}

impl ResponseGenerator {
    pub fn new(retriever: Retriever, model: Arc<dyn LanguageModel>) -> Self {
        Self { retriever, model }
    }

    /// Answer `query` given the prior conversation `history`.
    ///
    /// `history` holds earlier turns only; the current query is appended as
    /// the trailing User message unless `history` already ends with it.
    pub async fn generate(
        &self,
        query: &ChatQuery,
        history: &[ConversationMessage],
        debug: bool,
    ) -> Result<ChatResponse> {
        check_query(query)?;

        let context = self
            .retriever
            .retrieve(&query.content, self.retriever.default_k())
            .await?;
        let messages = assemble(&context, history, &query.content);

        if debug {
            render(&messages);
        }

        let reply = self.model.invoke(&messages).await?;
        let response = ChatResponse::generated(reply.content);
        info!(id = response.id, messages = messages.len(), "generated response");
        Ok(response)
    }

    /// Like [`generate`](Self::generate), but when `summary` is given the
    /// model sees only the running summary and the raw query text, and the
    /// summary is updated with the new turn afterwards. No retrieval happens
    /// in that case.
    pub async fn generate_with_summary(
        &self,
        query: &ChatQuery,
        history: &[ConversationMessage],
        summary: Option<&mut ConversationSummary>,
        debug: bool,
    ) -> Result<ChatResponse> {
        check_query(query)?;

        let Some(memory) = summary else {
            return self.generate(query, history, debug).await;
        };

        let messages = memory.prompt(&query.content);
        if debug {
            render(&messages);
        }

        let reply = self.model.invoke(&messages).await?;
        memory
            .update(self.model.as_ref(), &query.content, &reply.content)
            .await?;
        let response = ChatResponse::generated(reply.content);
        info!(id = response.id, "generated response from summary");
        Ok(response)
    }
}

fn check_query(query: &ChatQuery) -> Result<()> {
    if query.content.is_empty() {
        return Err(RagError::invalid_argument("query content must not be empty"));
    }
    Ok(())
}

/// Context first, then history verbatim, then the current turn.
pub fn assemble(
    context: &str,
    history: &[ConversationMessage],
    query: &str,
) -> Vec<ConversationMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if !context.is_empty() {
        messages.push(ConversationMessage::system(format!("Context: {}", context)));
    }
    messages.extend_from_slice(history);

    let already_current = matches!(
        history.last(),
        Some(ConversationMessage::User(text)) if text == query
    );
    if !already_current {
        messages.push(ConversationMessage::user(query));
    }
    messages
}

fn render(messages: &[ConversationMessage]) {
    for message in messages {
        info!("{}", message);
    }
}
