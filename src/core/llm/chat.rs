use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One role/content pair in a chat exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat invocation: ordered messages plus generation settings
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,

    /// Request streamed output; non-streaming providers yield one fragment
    pub stream: bool,

    /// Per-request override of the configured response token budget
    pub max_tokens: Option<u32>,

    /// Per-request override of the configured temperature
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, stream: bool) -> Self {
        Self {
            messages,
            stream,
            max_tokens: None,
            temperature: None,
        }
    }
}

/// A lazy, finite sequence of response text fragments in arrival order
pub type ChatStream = BoxStream<'static, Result<String>>;

/// Trait for chat endpoints that can analyze code
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a chat exchange and yield the response as text fragments.
    ///
    /// When `request.stream` is false the stream carries a single complete
    /// fragment. Endpoint failures (non-2xx, transport errors, malformed
    /// payloads) are surfaced as errors to the caller.
    async fn chat(&self, request: ChatRequest) -> Result<ChatStream>;

    /// Provider name for logging (e.g., "OpenAI", "Ollama")
    fn provider_name(&self) -> &str;

    /// Model name being used
    fn model_name(&self) -> &str;
}
