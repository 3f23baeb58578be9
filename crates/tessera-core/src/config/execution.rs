//! Query execution configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigError;

/// Settings for running native SQL against data sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Page size used when a request does not specify one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Pool size per data source.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Statement timeout. Unset means wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_connections: default_max_connections(),
            timeout_secs: None,
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::Config(
                "execution.default_page_size must be at least 1".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Config(
                "execution.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_page_size() -> u64 {
    25
}

fn default_max_connections() -> u32 {
    5
}
