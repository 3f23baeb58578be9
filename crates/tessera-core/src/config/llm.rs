//! Language model configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigError;

/// Environment variable consulted when `api_key` is not set in the file.
pub const API_KEY_ENV: &str = "TESSERA_LLM_API_KEY";

/// Language model client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    /// Credential handed to the provider.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier passed through to the provider.
    #[serde(default)]
    pub model: Option<String>,

    /// Program to run for the `command` provider.
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments for `command`.
    #[serde(default)]
    pub args: Vec<String>,

    /// Canned completion for the `fake` provider.
    #[serde(default)]
    pub response: Option<String>,

    /// Upper bound on a single model call.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Supported language model providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Returns a fixed completion. For development and tests.
    #[default]
    Fake,
    /// Runs an external program speaking JSON over stdin/stdout.
    Command,
}

impl LlmProvider {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fake => "fake",
            Self::Command => "command",
        }
    }

    pub fn requires_credentials(&self) -> bool {
        matches!(self, Self::Command)
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// The API key from the file, else from [`API_KEY_ENV`].
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider == LlmProvider::Command && self.command.is_none() {
            return Err(ConfigError::Config(
                "llm.command is required for the command provider".to_string(),
            ));
        }
        if self.provider.requires_credentials() && self.resolved_api_key().is_none() {
            return Err(ConfigError::MissingCredentials {
                provider: self.provider.name().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_provider_needs_nothing() {
        assert!(LlmConfig::default().validate().is_ok());
    }

    #[test]
    fn test_command_provider_requires_command() {
        let config = LlmConfig {
            provider: LlmProvider::Command,
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Config(_))));
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config = LlmConfig {
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        // Only meaningful when the environment does not provide one.
        if std::env::var(API_KEY_ENV).is_err() {
            assert!(config.resolved_api_key().is_none());
        }
    }
}
