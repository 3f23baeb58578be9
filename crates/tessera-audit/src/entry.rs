//! Query history entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryDataType {
    /// Rendered prompt payload sent to the model.
    UserPrompt,
    /// Statement produced by the model.
    GeneratedSql,
    /// Statement submitted by the caller for execution.
    UserExecutedSql,
    /// Native statement after rewriting.
    ActualExecutedSql,
}

impl HistoryDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserPrompt => "user_prompt",
            Self::GeneratedSql => "generated_sql",
            Self::UserExecutedSql => "user_executed_sql",
            Self::ActualExecutedSql => "actual_executed_sql",
        }
    }
}

impl std::fmt::Display for HistoryDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable record of the query history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    /// Requesting identity.
    pub user: String,
    pub data_type: HistoryDataType,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Always equal to `created_at`; entries are never updated.
    pub updated_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        user: impl Into<String>,
        data_type: HistoryDataType,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user: user.into(),
            data_type,
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
