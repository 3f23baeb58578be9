use async_trait::async_trait;
use std::sync::Mutex;

use super::{ChatMessage, LanguageModel};
use crate::error::LlmError;

/// Model that answers every request with a fixed completion.
pub struct FakeModel {
    response: Result<String, String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl Default for FakeModel {
    fn default() -> Self {
        Self::new("SELECT 1")
    }
}

impl FakeModel {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: Ok(response.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Messages received so far, one entry per call.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        self.response.clone().map_err(LlmError::Invocation)
    }
}
