//! Query history (audit) configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the query history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether entries are recorded at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: AuditBackend,

    /// Directory for the file backend.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// File name inside `directory`.
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Also echo entries on stdout (file backend only).
    #[serde(default)]
    pub stdout: bool,
}

/// Storage backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditBackend {
    /// Print entries to stdout.
    Console,
    /// Append JSON Lines to a file.
    #[default]
    File,
    /// Keep entries in memory (queryable, lost on restart).
    Memory,
    /// Discard entries.
    None,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            backend: AuditBackend::default(),
            directory: default_directory(),
            file_name: default_file_name(),
            stdout: false,
        }
    }
}

impl AuditConfig {
    /// Full path of the history file.
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_file_name() -> String {
    "query_history.jsonl".to_string()
}
