//! Chat-completion integration for function analysis
//!
//! This module provides a trait-based architecture for talking to different
//! chat endpoints. Providers surface response text as a lazy sequence of
//! fragments; callers accumulate before parsing. Transport failures are
//! returned as errors and never retried here.

mod chat;
mod providers;

pub use chat::{ChatClient, ChatMessage, ChatRequest, ChatStream};
pub use providers::{create_chat_client, OpenAiChatClient};
