//! Named pipelines and their steps.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tessera_audit::AuditLogger;
use tessera_core::{ConfigError, DataSource};

use crate::error::{LlmError, PipelineError};
use crate::llm::{ChatMessage, LanguageModel};
use crate::response::parse_candidates;
use crate::template::{TemplateValues, Templates};

/// Registered pipeline shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineName {
    #[serde(rename = "one_step_pipeline")]
    OneStep,
}

impl PipelineName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneStep => "one_step_pipeline",
        }
    }
}

impl fmt::Display for PipelineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_step_pipeline" => Ok(Self::OneStep),
            other => Err(ConfigError::InvalidPipelineName {
                name: other.to_string(),
            }),
        }
    }
}

/// Input to a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub user: String,
    pub question: String,
    /// Rendered DDL of the caller's virtual schema.
    pub db_schema: String,
    pub data_source: DataSource,
}

/// Running state handed from step to step.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub request: PipelineRequest,
    pub messages: Vec<ChatMessage>,
}

pub enum StepOutcome {
    Continue(PipelineContext),
    /// Candidate statements, best first.
    Finished(Vec<String>),
}

#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, context: PipelineContext) -> Result<StepOutcome, PipelineError>;
}

/// Sends the rendered messages to the model and parses its answer.
pub struct QueryGenerationStep {
    model: Arc<dyn LanguageModel>,
    timeout: Option<Duration>,
}

impl QueryGenerationStep {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Option<Duration>) -> Self {
        Self { model, timeout }
    }
}

#[async_trait]
impl Step for QueryGenerationStep {
    fn name(&self) -> &str {
        "query_generation"
    }

    async fn run(&self, context: PipelineContext) -> Result<StepOutcome, PipelineError> {
        let completion = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.model.complete(&context.messages))
                .await
                .map_err(|_| LlmError::Timeout(limit))??,
            None => self.model.complete(&context.messages).await?,
        };
        Ok(StepOutcome::Finished(parse_candidates(&completion)?))
    }
}

/// A constructed pipeline, ready to run once.
pub struct Pipeline {
    name: PipelineName,
    context: PipelineContext,
    steps: Vec<Box<dyn Step>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("steps", &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Pipeline {
    /// Render the prompt and record it as the request's `user_prompt` entry.
    ///
    /// This is the only side effect of construction; the model is not
    /// contacted until [`Pipeline::run`].
    pub async fn build(
        name: PipelineName,
        templates: &Templates,
        model: Arc<dyn LanguageModel>,
        timeout: Option<Duration>,
        audit: &AuditLogger,
        request: PipelineRequest,
    ) -> Result<Self, PipelineError> {
        let steps: Vec<Box<dyn Step>> = match name {
            PipelineName::OneStep => {
                vec![Box::new(QueryGenerationStep::new(Arc::clone(&model), timeout))]
            }
        };

        let values = TemplateValues {
            db_schema: &request.db_schema,
            dialect_name: request.data_source.dialect_name(),
            dialect_version: request.data_source.dialect_version(),
            question: &request.question,
        };
        let (system, assistant, human) = templates.render(&values);
        let messages = model.create_messages(&system, &assistant, &human);

        let payload = serde_json::to_string(&messages).map_err(LlmError::from)?;
        audit.log_user_prompt(&request.user, &payload).await?;

        tracing::debug!(
            pipeline = %name,
            model = model.name(),
            user = %request.user,
            data_source = request.data_source.id.0,
            "Pipeline constructed"
        );

        Ok(Self {
            name,
            context: PipelineContext { request, messages },
            steps,
        })
    }

    pub fn name(&self) -> PipelineName {
        self.name
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.context.messages
    }

    /// Run every step in order until one finishes.
    pub async fn run(self) -> Result<Vec<String>, PipelineError> {
        let mut context = self.context;
        for step in &self.steps {
            match step.run(context).await? {
                StepOutcome::Continue(next) => context = next,
                StepOutcome::Finished(candidates) => return Ok(candidates),
            }
        }
        Err(PipelineError::Incomplete(self.name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatRole, FakeModel};
    use pretty_assertions::assert_eq;
    use tessera_audit::{HistoryDataType, HistoryFilter};
    use tessera_core::{DataSourceId, DbKind};

    fn request() -> PipelineRequest {
        PipelineRequest {
            user: "alice".to_string(),
            question: "How many albums?".to_string(),
            db_schema: "CREATE TABLE Album (\n  AlbumId INTEGER\n);\n".to_string(),
            data_source: DataSource {
                id: DataSourceId(1),
                display_name: "chinook".to_string(),
                kind: DbKind::Sqlite,
                connection_str: "sqlite::memory:".to_string(),
                enabled: true,
                dialect_version: Some("3".to_string()),
            },
        }
    }

    #[test]
    fn test_pipeline_name_from_str() {
        assert_eq!("one_step_pipeline".parse::<PipelineName>().unwrap(), PipelineName::OneStep);
        let err = "two_step_pipeline".parse::<PipelineName>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid Pipeline Name");
    }

    #[tokio::test]
    async fn test_build_logs_rendered_prompt_once() {
        let (audit, storage) = AuditLogger::in_memory();
        let model = Arc::new(FakeModel::new("SELECT COUNT(*) FROM Album"));
        let templates = Templates {
            system: "{{dialect_name}} {{dialect_version}}\n{{db_schema}}".to_string(),
            assistant: "sql only".to_string(),
            human: "Q: {{question}}".to_string(),
        };

        let pipeline = Pipeline::build(
            PipelineName::OneStep,
            &templates,
            model.clone(),
            None,
            &audit,
            request(),
        )
        .await
        .unwrap();

        let prompts = audit
            .query(&HistoryFilter {
                data_type: Some(HistoryDataType::UserPrompt),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].content, serde_json::to_string(pipeline.messages()).unwrap());
        assert!(prompts[0].content.contains("sqlite 3\\nCREATE TABLE Album"));
        assert!(!prompts[0].content.contains("{{"));
        assert!(model.calls().is_empty());

        let candidates = pipeline.run().await.unwrap();
        assert_eq!(candidates, vec!["SELECT COUNT(*) FROM Album".to_string()]);
        assert_eq!(storage.entries().len(), 1);

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][2], ChatMessage::new(ChatRole::User, "Q: How many albums?"));
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("SELECT 1".to_string())
        }
    }

    #[tokio::test]
    async fn test_timeout_is_a_model_error() {
        let pipeline = Pipeline::build(
            PipelineName::OneStep,
            &Templates::default(),
            Arc::new(SlowModel),
            Some(Duration::from_millis(20)),
            &AuditLogger::disabled(),
            request(),
        )
        .await
        .unwrap();

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Llm(LlmError::Timeout(_))));
    }
}
