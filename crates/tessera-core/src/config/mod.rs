//! Configuration types for Tessera.
//!
//! Configuration is loaded from a single YAML file (`tessera.yaml`). Every
//! section is optional and falls back to its defaults.
//!
//! ```yaml
//! server:
//!   bind: 0.0.0.0:8000
//! catalog_file: catalog.yaml
//! llm:
//!   provider: command
//!   command: ./bin/complete
//!   timeout_secs: 30
//! pipeline:
//!   name: one_step_pipeline
//! execution:
//!   default_page_size: 25
//! ```

pub mod audit;
pub mod execution;
pub mod llm;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use audit::{AuditBackend, AuditConfig};
pub use execution::ExecutionConfig;
pub use llm::{LlmConfig, LlmProvider};

/// Complete Tessera configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TesseraConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Path to the catalog file (data sources, tables and selectors).
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub policy_cache: PolicyCacheConfig,

    #[serde(default)]
    pub introspection: IntrospectionConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8000"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Callers holding one of these roles may use the `admin/` routes.
    #[serde(default = "default_admin_roles")]
    pub admin_roles: Vec<String>,

    /// Users allowed on the `admin/` routes regardless of their roles.
    #[serde(default)]
    pub admin_users: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            admin_roles: default_admin_roles(),
            admin_users: Vec::new(),
        }
    }
}

/// Prompt pipeline selection and template overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Registered pipeline name.
    #[serde(default = "default_pipeline_name")]
    pub name: String,

    #[serde(default)]
    pub templates: TemplateOverrides,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            templates: TemplateOverrides::default(),
        }
    }
}

/// Replacement prompt templates. Unset entries use the built-in ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateOverrides {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub assistant: Option<String>,
    #[serde(default)]
    pub human: Option<String>,
}

/// Effective-policy cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyCacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PolicyCacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Where physical schema information comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntrospectionMode {
    /// Use the table and column records of the catalog.
    #[default]
    Catalog,
    /// Query the database's own catalog on every request.
    Live,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntrospectionConfig {
    #[serde(default)]
    pub mode: IntrospectionMode,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default `tracing` filter, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_admin_roles() -> Vec<String> {
    vec!["admin".to_string()]
}

fn default_pipeline_name() -> String {
    "one_step_pipeline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid Pipeline Name")]
    InvalidPipelineName { name: String },

    #[error("missing credentials for language model provider '{provider}'")]
    MissingCredentials { provider: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TesseraConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve relative paths against the file's directory.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(catalog_file) = &config.catalog_file {
            if catalog_file.is_relative() {
                config.catalog_file = Some(base_dir.join(catalog_file));
            }
        }

        if config.audit.directory.is_relative() {
            config.audit.directory = base_dir.join(&config.audit.directory);
        }

        Ok(config)
    }

    /// Check settings that can be verified without touching external systems.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog_file.is_none() {
            return Err(ConfigError::Config("catalog_file is required".to_string()));
        }
        self.execution.validate()?;
        self.llm.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let config = TesseraConfig::from_yaml("{}").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8000");
        assert_eq!(config.server.admin_roles, vec!["admin".to_string()]);
        assert!(config.server.admin_users.is_empty());
        assert_eq!(config.pipeline.name, "one_step_pipeline");
        assert_eq!(config.execution.default_page_size, 25);
        assert!(config.policy_cache.enabled);
        assert_eq!(config.introspection.mode, IntrospectionMode::Catalog);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_parse_sections() {
        let yaml = r#"
server:
  bind: 127.0.0.1:9000
  admin_users: [ops]
catalog_file: catalog.yaml
pipeline:
  name: one_step_pipeline
  templates:
    human: "Q: {{question}}"
policy_cache:
  enabled: false
introspection:
  mode: live
"#;
        let config = TesseraConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.server.admin_users, vec!["ops".to_string()]);
        assert_eq!(config.server.admin_roles, vec!["admin".to_string()]);
        assert_eq!(config.pipeline.templates.human.as_deref(), Some("Q: {{question}}"));
        assert!(config.pipeline.templates.system.is_none());
        assert!(!config.policy_cache.enabled);
        assert_eq!(config.introspection.mode, IntrospectionMode::Live);
    }

    #[test]
    fn test_load_with_context_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tessera.yaml");
        fs::write(&path, "catalog_file: catalog.yaml\n").unwrap();

        let config = TesseraConfig::load_with_context(&path).unwrap();
        assert_eq!(config.catalog_file, Some(dir.path().join("catalog.yaml")));
        assert!(config.audit.directory.starts_with(dir.path()));
    }

    #[test]
    fn test_validate_requires_catalog() {
        let config = TesseraConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Config(_))));
    }

    #[test]
    fn test_invalid_pipeline_name_message() {
        let err = ConfigError::InvalidPipelineName {
            name: "two_step".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid Pipeline Name");
    }
}
