use crate::error::TaleError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Sampling parameters for one model role.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text of every returned choice, in the order the API listed them.
    /// May be empty.
    pub candidates: Vec<String>,
    pub usage: Option<Usage>,
}

impl LlmResponse {
    pub fn first_candidate(&self) -> Option<&str> {
        self.candidates.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Events emitted during streaming LLM responses.
///
/// A stream always ends with `Done` or `Error`. A receiver that closes
/// without either was cut short.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    TextDelta(String),
    Done,
    /// `transient` marks failures worth retrying (stalls, dropped
    /// connections, overloaded servers).
    Error { message: String, transient: bool },
}

impl StreamEvent {
    pub fn transient_error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            transient: true,
        }
    }

    pub fn fatal_error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            transient: false,
        }
    }
}

/// The LLM client trait. Implementations provide both blocking and streaming chat.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat request and get every candidate back at once.
    async fn chat(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<LlmResponse, TaleError>;

    /// Send a chat request and get a stream of events.
    async fn chat_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<futures::channel::mpsc::UnboundedReceiver<StreamEvent>, TaleError>;
}
