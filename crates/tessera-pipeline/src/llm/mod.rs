//! Language model clients.
//!
//! A [`LanguageModel`] turns the three rendered templates into the message
//! structure it expects and completes them. Clients are resolved from
//! configuration by a [`ModelFactory`].

mod command;
mod factory;
mod fake;

pub use command::CommandModel;
pub use factory::{LlmFactory, ModelFactory, StaticModelFactory};
pub use fake::FakeModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    Assistant,
    User,
}

/// One message of a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    /// Format rendered templates into the messages sent to the model.
    fn create_messages(&self, system: &str, assistant: &str, human: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::new(ChatRole::System, system),
            ChatMessage::new(ChatRole::Assistant, assistant),
            ChatMessage::new(ChatRole::User, human),
        ]
    }

    /// Raw completion text for `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}
