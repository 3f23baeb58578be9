//! Model client backed by an external program.
//!
//! The program receives `{"model": …, "messages": […]}` as JSON on stdin and
//! writes the completion text to stdout. A non-zero exit status is a failure
//! whose message is the program's stderr.

use async_trait::async_trait;
use serde::Serialize;
use std::process::Stdio;
use tessera_core::config::llm::API_KEY_ENV;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{ChatMessage, LanguageModel};
use crate::error::LlmError;

pub struct CommandModel {
    program: String,
    args: Vec<String>,
    model: Option<String>,
    api_key: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
}

impl CommandModel {
    pub fn new(program: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            model: None,
            api_key: api_key.into(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

#[async_trait]
impl LanguageModel for CommandModel {
    fn name(&self) -> &str {
        "command"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request = serde_json::to_vec(&CompletionRequest {
            model: self.model.as_deref(),
            messages,
        })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(API_KEY_ENV, &self.api_key)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LlmError::Invocation(format!("cannot start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&request).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            };
            return Err(LlmError::Invocation(message));
        }

        tracing::debug!(
            program = %self.program,
            bytes = output.stdout.len(),
            "Model command completed"
        );
        String::from_utf8(output.stdout)
            .map_err(|e| LlmError::Invocation(format!("non UTF-8 completion: {}", e)))
    }
}
