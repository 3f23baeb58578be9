//! # tessera-pipeline
//!
//! Turns a question and a virtual schema into candidate SQL.
//!
//! A [`Pipeline`] is built from a [`PipelineName`], the prompt [`Templates`]
//! and a [`LanguageModel`]. Building renders the prompt and writes the
//! `user_prompt` history entry; running it calls the model and parses the
//! completion. [`llm_response`] wraps the whole sequence and converts every
//! failure into an [`LlmResponse::Error`].

pub mod error;
pub mod llm;
pub mod pipeline;
pub mod response;
pub mod template;

pub use error::{LlmError, PipelineError};
pub use llm::{
    ChatMessage, ChatRole, CommandModel, FakeModel, LanguageModel, LlmFactory, ModelFactory,
    StaticModelFactory,
};
pub use pipeline::{
    Pipeline, PipelineContext, PipelineName, PipelineRequest, QueryGenerationStep, Step,
    StepOutcome,
};
pub use template::{TemplateValues, Templates};

use serde::Serialize;
use std::time::Duration;
use tessera_audit::AuditLogger;
use tessera_core::{ConfigError, TesseraConfig};

/// Pipeline selection resolved from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub name: PipelineName,
    pub templates: Templates,
    pub timeout: Option<Duration>,
}

impl PipelineSettings {
    pub fn from_config(config: &TesseraConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            name: config.pipeline.name.parse()?,
            templates: Templates::from_overrides(&config.pipeline.templates),
            timeout: config.llm.timeout(),
        })
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            name: PipelineName::OneStep,
            templates: Templates::default(),
            timeout: None,
        }
    }
}

/// Outcome of [`llm_response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LlmResponse {
    Success { generated_sql: String },
    Error { error: String },
}

/// Resolve the model, build and run the pipeline.
///
/// Never fails: any error along the way becomes [`LlmResponse::Error`]
/// carrying the error's message.
pub async fn llm_response(
    factory: &dyn ModelFactory,
    settings: &PipelineSettings,
    audit: &AuditLogger,
    request: PipelineRequest,
) -> LlmResponse {
    match generate(factory, settings, audit, request).await {
        Ok(generated_sql) => LlmResponse::Success { generated_sql },
        Err(e) => {
            tracing::warn!(error = %e, pipeline = %settings.name, "Pipeline failed");
            LlmResponse::Error {
                error: e.to_string(),
            }
        }
    }
}

async fn generate(
    factory: &dyn ModelFactory,
    settings: &PipelineSettings,
    audit: &AuditLogger,
    request: PipelineRequest,
) -> Result<String, PipelineError> {
    let model = factory.create()?;
    let pipeline = Pipeline::build(
        settings.name,
        &settings.templates,
        model,
        settings.timeout,
        audit,
        request,
    )
    .await?;
    let name = pipeline.name();
    pipeline
        .run()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::Incomplete(name.to_string()))
}
