//! Error types for the pipeline crate.

use std::time::Duration;
use tessera_audit::AuditError;
use tessera_core::ConfigError;
use thiserror::Error;

/// Errors raised by a language model client.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The model could not be reached or reported a failure.
    #[error("language model call failed: {0}")]
    Invocation(String),

    #[error("language model did not answer within {0:?}")]
    Timeout(Duration),

    #[error("language model returned an empty response")]
    EmptyResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while building or running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    /// Every step ran without producing a result.
    #[error("pipeline {0} finished without a result")]
    Incomplete(String),
}
