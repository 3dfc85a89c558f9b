//! Running conversation summary for the summary-aware generation mode.
//!
//! Instead of replaying the full history, the model sees a system prompt
//! carrying the current summary plus the new user input. After each reply
//! the summary is extended by one more model call.

use crate::error::Result;
use crate::llm::LanguageModel;
use crate::models::ConversationMessage;

const CONVERSATION_PREAMBLE: &str = "The following is a friendly conversation between a human and an AI. \
The AI is talkative and provides lots of specific details from its context. \
If the AI does not know the answer to a question, it truthfully says it does not know.";

const SUMMARIZER_PREAMBLE: &str = "Progressively summarize the lines of conversation provided, \
adding onto the previous summary and returning a new summary.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationSummary {
    buffer: String,
}

impl ConversationSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a previously stored summary.
    pub fn from_buffer(buffer: impl Into<String>) -> Self {
        Self {
            buffer: buffer.into(),
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Messages to send for `input` given the summary so far.
    pub fn prompt(&self, input: &str) -> Vec<ConversationMessage> {
        vec![
            ConversationMessage::system(format!(
                "{}\n\nCurrent conversation summary:\n{}",
                CONVERSATION_PREAMBLE, self.buffer
            )),
            ConversationMessage::user(input),
        ]
    }

    /// Fold one completed turn into the summary.
    pub async fn update(
        &mut self,
        model: &dyn LanguageModel,
        input: &str,
        reply: &str,
    ) -> Result<()> {
        let request = format!(
            "{}\n\nCurrent summary:\n{}\n\nNew lines of conversation:\nHuman: {}\nAI: {}\n\nNew summary:",
            SUMMARIZER_PREAMBLE, self.buffer, input, reply
        );
        let summary = model
            .invoke(&[ConversationMessage::user(request)])
            .await?;
        self.buffer = summary.content.trim().to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelReply;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for Echo {
        async fn invoke(&self, messages: &[ConversationMessage]) -> Result<ModelReply> {
            let last = messages
                .last()
                .map(|m| m.content().to_string())
                .unwrap_or_default();
            self.seen.lock().unwrap().push(last);
            Ok(ModelReply {
                content: "  the human greeted the AI  ".into(),
            })
        }
    }

    #[test]
    fn prompt_carries_summary_then_input() {
        let memory = ConversationSummary::from_buffer("they talked about rust");
        let msgs = memory.prompt("and then?");
        assert_eq!(msgs.len(), 2);
        assert!(matches!(msgs[0], ConversationMessage::System(_)));
        assert!(msgs[0].content().ends_with("they talked about rust"));
        assert_eq!(msgs[1], ConversationMessage::user("and then?"));
    }

    #[tokio::test]
    async fn update_replaces_buffer_with_model_summary() {
        let model = Echo {
            seen: Mutex::new(Vec::new()),
        };
        let mut memory = ConversationSummary::new();
        memory.update(&model, "hello", "hi there").await.unwrap();

        assert_eq!(memory.buffer(), "the human greeted the AI");
        let seen = model.seen.lock().unwrap();
        assert!(seen[0].contains("Human: hello\nAI: hi there"));
    }
}
