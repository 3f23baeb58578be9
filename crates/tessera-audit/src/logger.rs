//! Query history logger.
//!
//! Provides the main `AuditLogger` type with one helper per history data
//! type.

use std::sync::Arc;
use tessera_core::AuditConfig;

use crate::entry::{HistoryDataType, HistoryEntry};
use crate::error::AuditError;
use crate::storage::{HistoryFilter, HistoryStorage, MemoryStorage, NullStorage, create_storage};

/// The query history logger.
#[derive(Clone)]
pub struct AuditLogger {
    enabled: bool,
    storage: Arc<dyn HistoryStorage>,
}

impl AuditLogger {
    /// Create a logger with the backend named in `config`.
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        Ok(Self {
            enabled: config.enabled,
            storage: Arc::from(create_storage(config)?),
        })
    }

    /// Logger writing to `storage`.
    pub fn with_storage(storage: Arc<dyn HistoryStorage>) -> Self {
        Self {
            enabled: true,
            storage,
        }
    }

    /// Create a logger backed by a fresh [`MemoryStorage`], returning both.
    pub fn in_memory() -> (Self, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (Self::with_storage(storage.clone()), storage)
    }

    /// Logger that records nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            storage: Arc::new(NullStorage),
        }
    }

    /// Whether entries are recorded.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append an entry.
    pub async fn log(&self, entry: HistoryEntry) -> Result<(), AuditError> {
        if !self.enabled {
            return Ok(());
        }

        // Mirror to tracing.
        tracing::debug!(
            entry_id = %entry.id,
            data_type = %entry.data_type,
            user = %entry.user,
            "History entry"
        );

        self.storage.append(entry).await
    }

    async fn record(
        &self,
        user: &str,
        data_type: HistoryDataType,
        content: &str,
    ) -> Result<(), AuditError> {
        self.log(HistoryEntry::new(user, data_type, content)).await
    }

    /// Log the rendered prompt payload sent to the model.
    pub async fn log_user_prompt(&self, user: &str, payload: &str) -> Result<(), AuditError> {
        self.record(user, HistoryDataType::UserPrompt, payload).await
    }

    pub async fn log_generated_sql(&self, user: &str, sql: &str) -> Result<(), AuditError> {
        self.record(user, HistoryDataType::GeneratedSql, sql).await
    }

    pub async fn log_user_executed_sql(&self, user: &str, sql: &str) -> Result<(), AuditError> {
        self.record(user, HistoryDataType::UserExecutedSql, sql).await
    }

    pub async fn log_actual_executed_sql(&self, user: &str, sql: &str) -> Result<(), AuditError> {
        self.record(user, HistoryDataType::ActualExecutedSql, sql).await
    }

    /// Query history entries with filters.
    pub async fn query(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, AuditError> {
        self.storage.query(filter).await
    }
}
