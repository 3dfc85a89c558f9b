//! Chat Exchange Accumulator.
//!
//! Appends generated exchanges to a chat's history. The accumulator takes
//! the chat record by value and hands back the updated record, so no caller
//! ever observes a half-appended history.

use crate::error::{RagError, Result};
use crate::models::{ChatDetails, ChatExchange, ChatQuery, ChatResponse, ConversationMessage};

/// `1` for an empty history, otherwise one past the largest exchange id.
pub fn next_exchange_id(chat: &ChatDetails) -> i64 {
    chat.history
        .iter()
        .map(|ex| ex.id_exchange)
        .max()
        .map_or(1, |max| max + 1)
}

/// Build the exchange that [`append`] would accept next for `chat`.
pub fn new_exchange(chat: &ChatDetails, query: ChatQuery, response: ChatResponse) -> ChatExchange {
    ChatExchange {
        id_exchange: next_exchange_id(chat),
        id_chat: chat.id_chat,
        query,
        response,
    }
}

/// Append `exchange` to the end of `chat.history`.
///
/// Fails with [`RagError::InvalidArgument`] when the exchange belongs to a
/// different chat. Identical exchanges are not deduplicated.
pub fn append(mut chat: ChatDetails, exchange: ChatExchange) -> Result<ChatDetails> {
    if exchange.id_chat != chat.id_chat {
        return Err(RagError::invalid_argument(format!(
            "exchange is stamped for chat {} but was appended to chat {}",
            exchange.id_chat, chat.id_chat
        )));
    }
    chat.history.push(exchange);
    Ok(chat)
}

/// One User and one Assistant message per exchange, in chat order.
pub fn conversation(history: &[ChatExchange]) -> Vec<ConversationMessage> {
    history
        .iter()
        .flat_map(|ex| {
            [
                ConversationMessage::user(ex.query.content.clone()),
                ConversationMessage::assistant(ex.response.content.clone()),
            ]
        })
        .collect()
}
