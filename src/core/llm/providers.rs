use futures::{StreamExt, TryStreamExt};
use serde_json::json;

use super::chat::{ChatClient, ChatRequest, ChatStream};
use crate::config::LlmConfig;
use crate::error::{RefactoryError, Result};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Factory function to create the appropriate chat client based on config
pub fn create_chat_client(config: &LlmConfig) -> Result<Box<dyn ChatClient>> {
    match config.provider.as_str() {
        "openai" | "openai-compatible" => {
            Ok(Box::new(OpenAiChatClient::new(config, OPENAI_BASE_URL)?))
        }
        "ollama" => Ok(Box::new(OpenAiChatClient::new(config, OLLAMA_BASE_URL)?)),
        _ => Err(RefactoryError::Config(format!(
            "Unsupported LLM provider: {}",
            config.provider
        ))),
    }
}

/// Client for OpenAI-compatible chat-completion endpoints
pub struct OpenAiChatClient {
    config: LlmConfig,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiChatClient {
    pub fn new(config: &LlmConfig, default_base_url: &str) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());

        if api_key.is_none() && !config.provider.contains("ollama") {
            return Err(RefactoryError::Config(
                "API key required for external LLM providers".to_string(),
            ));
        }

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url.to_string());

        Ok(Self {
            config: config.clone(),
            base_url,
            api_key,
            client: reqwest::Client::new(),
        })
    }

    /// Turn an SSE response body into a stream of content deltas.
    ///
    /// Byte chunks are buffered until complete `data:` lines are available;
    /// the `[DONE]` terminator and non-delta events are dropped.
    fn sse_stream(response: reqwest::Response) -> ChatStream {
        response
            .bytes_stream()
            .map_err(|e| RefactoryError::Chat(format!("stream error: {}", e)))
            .scan(String::new(), |buffer, chunk| {
                let fragments = match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        drain_sse_events(buffer)
                    }
                    Err(e) => vec![Err(e)],
                };
                futures::future::ready(Some(futures::stream::iter(fragments)))
            })
            .flatten()
            .boxed()
    }
}

fn drain_sse_events(buffer: &mut String) -> Vec<Result<String>> {
    let mut fragments = Vec::new();
    while let Some(pos) = buffer.find('\n') {
        let line = buffer[..pos].trim().to_string();
        buffer.drain(..=pos);

        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            continue;
        }
        if let Ok(event) = serde_json::from_str::<serde_json::Value>(data) {
            if let Some(text) = event["choices"][0]["delta"]["content"].as_str() {
                if !text.is_empty() {
                    fragments.push(Ok(text.to_string()));
                }
            }
        }
    }
    fragments
}

#[async_trait::async_trait]
impl ChatClient for OpenAiChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatStream> {
        let payload = json!({
            "model": self.config.model,
            "messages": request.messages,
            "stream": request.stream,
            "max_tokens": request.max_tokens.or(self.config.max_tokens).unwrap_or(2000),
            "temperature": request.temperature.or(self.config.temperature).unwrap_or(0.3),
        });

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder
            .json(&payload)
            .send()
            .await
            .map_err(|e| RefactoryError::Chat(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RefactoryError::Chat(format!(
                "endpoint returned {}: {}",
                status, error_text
            )));
        }

        if request.stream {
            Ok(Self::sse_stream(response))
        } else {
            let data: serde_json::Value = response
                .json()
                .await
                .map_err(|e| RefactoryError::Chat(format!("malformed response: {}", e)))?;
            let content = data["choices"][0]["message"]["content"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            Ok(futures::stream::iter(vec![Ok(content)]).boxed())
        }
    }

    fn provider_name(&self) -> &str {
        match self.config.provider.as_str() {
            "openai" => "OpenAI",
            "openai-compatible" => "OpenAI-compatible",
            "ollama" => "Ollama",
            _ => "Unknown provider",
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
