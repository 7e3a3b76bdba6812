//! Generative model trait and prompt assembly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dialogue::{DialogueHistory, Role};
use crate::document::Chunk;
use crate::error::Result;

/// Role of a message sent to a chat model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions and retrieved context.
    System,
    /// A user message.
    User,
    /// A previous model answer.
    Assistant,
}

/// A single chat message in the wire-neutral form adapters translate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Create a message.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

const ANSWER_INSTRUCTIONS: &str = "You answer questions about the user's documents. \
Use only the passages below as your source. If they do not contain the answer, \
say that you do not know instead of guessing.";

const CONDENSE_INSTRUCTIONS: &str = "Rewrite the follow-up question so it can be \
understood without the conversation. Keep its language. Reply with the rewritten \
question only.";

/// Everything the model sees when answering one question.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// The user's question.
    pub question: &'a str,
    /// Retrieved supporting passages, best first.
    pub context: &'a [Chunk],
    /// The conversation so far, not including `question`.
    pub history: &'a DialogueHistory,
}

impl GenerationRequest<'_> {
    /// Render the request as chat messages: a system message with the
    /// passages, the history, then the question.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let passages =
            self.context.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>().join("\n\n");

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::new(
            MessageRole::System,
            format!("{ANSWER_INSTRUCTIONS}\n\nPassages:\n{passages}"),
        ));
        messages.extend(self.history.turns().iter().map(|turn| {
            let role = match turn.role {
                Role::User => MessageRole::User,
                Role::Assistant => MessageRole::Assistant,
            };
            ChatMessage::new(role, turn.text.clone())
        }));
        messages.push(ChatMessage::new(MessageRole::User, self.question));
        messages
    }
}

/// Messages asking the model to turn a follow-up into a standalone question.
pub fn condense_messages(question: &str, history: &DialogueHistory) -> Vec<ChatMessage> {
    let transcript = history
        .exchanges()
        .map(|(q, a)| format!("User: {q}\nAssistant: {a}"))
        .collect::<Vec<_>>()
        .join("\n");
    vec![
        ChatMessage::new(MessageRole::System, CONDENSE_INSTRUCTIONS),
        ChatMessage::new(
            MessageRole::User,
            format!("Conversation:\n{transcript}\n\nFollow-up question: {question}"),
        ),
    ]
}

/// A chat-capable language model.
///
/// Adapters implement [`complete`](GenerativeModel::complete); the default
/// [`generate`](GenerativeModel::generate) renders a [`GenerationRequest`]
/// with [`GenerationRequest::to_messages`].
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model name, used in errors and logs.
    fn name(&self) -> &str;

    /// Return the model's reply to `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Answer `request.question` from the retrieved context and history.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        self.complete(&request.to_messages()).await
    }
}
