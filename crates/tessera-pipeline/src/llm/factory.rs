use std::sync::Arc;
use tessera_core::{ConfigError, LlmConfig, LlmProvider};

use super::{CommandModel, FakeModel, LanguageModel};

/// Resolves the language model client for a request.
pub trait ModelFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn LanguageModel>, ConfigError>;
}

/// Factory driven by the `llm` configuration section.
#[derive(Debug, Clone)]
pub struct LlmFactory {
    config: LlmConfig,
}

impl LlmFactory {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }
}

impl ModelFactory for LlmFactory {
    fn create(&self) -> Result<Arc<dyn LanguageModel>, ConfigError> {
        match self.config.provider {
            LlmProvider::Fake => Ok(Arc::new(match &self.config.response {
                Some(response) => FakeModel::new(response.clone()),
                None => FakeModel::default(),
            })),
            LlmProvider::Command => {
                let program = self.config.command.clone().ok_or_else(|| {
                    ConfigError::Config(
                        "llm.command is required for the command provider".to_string(),
                    )
                })?;
                let api_key =
                    self.config
                        .resolved_api_key()
                        .ok_or_else(|| ConfigError::MissingCredentials {
                            provider: self.config.provider.name().to_string(),
                        })?;
                Ok(Arc::new(
                    CommandModel::new(program, api_key)
                        .with_args(self.config.args.clone())
                        .with_model(self.config.model.clone()),
                ))
            }
        }
    }
}

/// Factory that always hands out the same client.
pub struct StaticModelFactory(pub Arc<dyn LanguageModel>);

impl ModelFactory for StaticModelFactory {
    fn create(&self) -> Result<Arc<dyn LanguageModel>, ConfigError> {
        Ok(Arc::clone(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_provider_uses_configured_response() {
        let factory = LlmFactory::new(LlmConfig {
            response: Some("SELECT 2".to_string()),
            ..Default::default()
        });
        assert_eq!(factory.create().unwrap().name(), "fake");
    }

    #[test]
    fn test_command_provider_without_key() {
        // Only meaningful when the environment does not provide a key.
        if std::env::var(tessera_core::config::llm::API_KEY_ENV).is_ok() {
            return;
        }
        let factory = LlmFactory::new(LlmConfig {
            provider: LlmProvider::Command,
            command: Some("complete".to_string()),
            ..Default::default()
        });
        let err = factory.create().err().unwrap();
        assert_eq!(
            err.to_string(),
            "missing credentials for language model provider 'command'"
        );
    }

    #[test]
    fn test_command_provider_with_key() {
        let factory = LlmFactory::new(LlmConfig {
            provider: LlmProvider::Command,
            command: Some("complete".to_string()),
            api_key: Some("k".to_string()),
            ..Default::default()
        });
        assert_eq!(factory.create().unwrap().name(), "command");
    }
}
