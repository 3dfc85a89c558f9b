//! Chat-completion model abstraction.
//!
//! [`LanguageModel`] takes an ordered message list and returns the model's
//! reply. Backends:
//!
//! | Config Value | Model | Endpoint |
//! |-------------|-------|----------|
//! | `"openai"` | [`OpenAiChat`] | `POST {url}/chat/completions` |
//! | `"ollama"` | [`OllamaChat`] | `POST {url}/api/chat` |
//!
//! With `[llm].message_aware = true` (the default) the backend is wrapped in
//! [`MessageAwareModel`], which folds history and context into one system
//! prompt before each call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{RagError, Result};
use crate::models::ConversationMessage;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Text produced by one model invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub content: String,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, messages: &[ConversationMessage]) -> Result<ModelReply>;
}

#[async_trait]
impl<M: LanguageModel + ?Sized> LanguageModel for Arc<M> {
    async fn invoke(&self, messages: &[ConversationMessage]) -> Result<ModelReply> {
        (**self).invoke(messages).await
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn wire_messages(messages: &[ConversationMessage]) -> Vec<WireMessage<'_>> {
    messages
        .iter()
        .map(|m| WireMessage {
            role: m.api_role(),
            content: m.content(),
        })
        .collect()
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

// ============ OpenAI ============

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiChat {
    model: String,
    temperature: f32,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    /// Requires `OPENAI_API_KEY` in the environment.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RagError::invalid_argument("OPENAI_API_KEY environment variable not set"))?;
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string());
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn invoke(&self, messages: &[ConversationMessage]) -> Result<ModelReply> {
        let body = OpenAiRequest {
            model: &self.model,
            messages: wire_messages(messages),
            temperature: self.temperature,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RagError::upstream(format!(
                "OpenAI chat error {}: {}",
                status, text
            )));
        }

        let data: OpenAiResponse = resp.json().await?;
        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::upstream("OpenAI chat response had no message content"))?;

        Ok(ModelReply { content })
    }
}

// ============ Ollama ============

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

pub struct OllamaChat {
    model: String,
    temperature: f32,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaChat {
    async fn invoke(&self, messages: &[ConversationMessage]) -> Result<ModelReply> {
        let body = OllamaRequest {
            model: &self.model,
            messages: wire_messages(messages),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let resp = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RagError::upstream(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.base_url, e
                ))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RagError::upstream(format!(
                "Ollama chat error {}: {}",
                status, text
            )));
        }

        let data: OllamaResponse = resp.json().await?;
        let message = data
            .message
            .ok_or_else(|| RagError::upstream("Ollama chat response had no message"))?;

        Ok(ModelReply {
            content: message.content,
        })
    }
}

// ============ Message-aware adapter ============

/// Collapses a conversation into `[system prompt, current user message]`.
///
/// Prior User/Assistant turns become the "Conversation History" block and
/// System messages become the "Context" block. The last message must be the
/// current User turn; anything else is [`RagError::InvalidState`].
pub struct MessageAwareModel<M> {
    inner: M,
}

impl<M: LanguageModel> MessageAwareModel<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    pub fn fold(messages: &[ConversationMessage]) -> Result<Vec<ConversationMessage>> {
        let (current, earlier) = match messages.split_last() {
            Some((last @ ConversationMessage::User(_), earlier)) => (last, earlier),
            _ => {
                return Err(RagError::invalid_state(
                    "last message must be the current user query",
                ))
            }
        };

        let mut history = String::new();
        let mut context = Vec::new();
        for msg in earlier {
            match msg {
                ConversationMessage::User(_) | ConversationMessage::Assistant(_) => {
                    history.push_str(&msg.to_string());
                    history.push('\n');
                }
                ConversationMessage::System(text) => context.push(text.as_str()),
            }
        }

        let prompt = format!(
            "You are a helpful assistant. Use the conversation history and the retrieved context to answer the user's question.\n\nConversation History:\n{}\nContext:\n{}\n",
            history,
            context.join("\n")
        );

        Ok(vec![ConversationMessage::system(prompt), current.clone()])
    }
}

#[async_trait]
impl<M: LanguageModel> LanguageModel for MessageAwareModel<M> {
    async fn invoke(&self, messages: &[ConversationMessage]) -> Result<ModelReply> {
        let folded = Self::fold(messages)?;
        self.inner.invoke(&folded).await
    }
}

/// Build the model named by `[llm].provider`, wrapped per `[llm].message_aware`.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    let base: Arc<dyn LanguageModel> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAiChat::new(config)?),
        "ollama" => Arc::new(OllamaChat::new(config)?),
        other => {
            return Err(RagError::invalid_argument(format!(
                "unknown llm provider: {}",
                other
            )))
        }
    };

    if config.message_aware {
        Ok(Arc::new(MessageAwareModel::new(base)))
    } else {
        Ok(base)
    }
}
