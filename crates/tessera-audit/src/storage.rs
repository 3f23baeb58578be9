//! History storage backends.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tessera_core::{AuditBackend, AuditConfig};
use tokio::io::AsyncWriteExt;

use crate::entry::{HistoryDataType, HistoryEntry};
use crate::error::AuditError;

/// Trait for history storage backends.
///
/// Implementations must tolerate concurrent `append` calls; each call is a
/// single insert.
#[async_trait]
pub trait HistoryStorage: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> Result<(), AuditError>;

    /// Entries matching `filter`, oldest first.
    async fn query(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, AuditError>;
}

/// Filter for querying history entries.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub user: Option<String>,
    pub data_type: Option<HistoryDataType>,
    /// Keep only the most recent `limit` matches.
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        if let Some(ref user) = self.user {
            if &entry.user != user {
                return false;
            }
        }
        if let Some(data_type) = self.data_type {
            if entry.data_type != data_type {
                return false;
            }
        }
        true
    }

    fn apply(&self, entries: impl Iterator<Item = HistoryEntry>) -> Vec<HistoryEntry> {
        let mut results: Vec<HistoryEntry> = entries.filter(|e| self.matches(e)).collect();
        if let Some(limit) = self.limit {
            let skip = results.len().saturating_sub(limit);
            results.drain(..skip);
        }
        results
    }
}

/// Create a storage backend based on configuration.
pub fn create_storage(config: &AuditConfig) -> Result<Box<dyn HistoryStorage>, AuditError> {
    if !config.enabled {
        return Ok(Box::new(NullStorage));
    }
    match config.backend {
        AuditBackend::Console => Ok(Box::new(ConsoleStorage)),
        AuditBackend::File => {
            Ok(Box::new(FileStorage::new(config.file_path())?.with_stdout(config.stdout)))
        }
        AuditBackend::Memory => Ok(Box::new(MemoryStorage::new())),
        AuditBackend::None => Ok(Box::new(NullStorage)),
    }
}

/// Console storage (one JSON line per entry on stdout).
pub struct ConsoleStorage;

#[async_trait]
impl HistoryStorage for ConsoleStorage {
    async fn append(&self, entry: HistoryEntry) -> Result<(), AuditError> {
        let json = serde_json::to_string(&entry)?;
        println!("{}", json);
        Ok(())
    }

    async fn query(&self, _filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, AuditError> {
        // Console storage doesn't support querying
        Ok(vec![])
    }
}

/// File storage (appends JSON Lines to a file).
pub struct FileStorage {
    path: PathBuf,
    stdout: bool,
}

impl FileStorage {
    /// Create a file storage, creating the parent directory if needed.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| AuditError::Location {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(Self {
            path,
            stdout: false,
        })
    }

    /// Also echo every entry on stdout.
    pub fn with_stdout(mut self, stdout: bool) -> Self {
        self.stdout = stdout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryStorage for FileStorage {
    async fn append(&self, entry: HistoryEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        if self.stdout {
            print!("{}", line);
        }
        Ok(())
    }

    async fn query(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, AuditError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = line_no + 1,
                        error = %e,
                        "Skipping malformed history line"
                    );
                }
            }
        }
        Ok(filter.apply(entries.into_iter()))
    }
}

/// In-memory storage.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HistoryStorage for MemoryStorage {
    async fn append(&self, entry: HistoryEntry) -> Result<(), AuditError> {
        let mut entries = self.entries.write().map_err(|e| {
            AuditError::Unavailable(e.to_string())
        })?;
        entries.push(entry);
        Ok(())
    }

    async fn query(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, AuditError> {
        let entries = self.entries.read().map_err(|e| {
            AuditError::Unavailable(e.to_string())
        })?;
        Ok(filter.apply(entries.iter().cloned()))
    }
}

/// Storage that discards every entry.
pub struct NullStorage;

#[async_trait]
impl HistoryStorage for NullStorage {
    async fn append(&self, _entry: HistoryEntry) -> Result<(), AuditError> {
        Ok(())
    }

    async fn query(&self, _filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, AuditError> {
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_storage() {
        let storage = ConsoleStorage;
        let entry = HistoryEntry::new("alice", HistoryDataType::GeneratedSql, "SELECT 1");

        // Should not error
        storage.append(entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested/history.jsonl")).unwrap();

        storage
            .append(HistoryEntry::new("alice", HistoryDataType::UserPrompt, "[]"))
            .await
            .unwrap();
        storage
            .append(HistoryEntry::new("bob", HistoryDataType::GeneratedSql, "SELECT 1"))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(storage.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let filter = HistoryFilter {
            user: Some("bob".to_string()),
            ..Default::default()
        };
        let results = storage.query(&filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "SELECT 1");
    }

    #[tokio::test]
    async fn test_file_storage_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("none.jsonl")).unwrap();
        assert!(storage.query(&HistoryFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_storage_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        std::fs::write(&path, "not json\n\n").unwrap();

        let storage = FileStorage::new(&path).unwrap();
        storage
            .append(HistoryEntry::new("alice", HistoryDataType::UserPrompt, "[]"))
            .await
            .unwrap();

        assert_eq!(storage.query(&HistoryFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_storage_filter_and_limit() {
        let storage = MemoryStorage::new();
        for i in 0..5 {
            storage
                .append(HistoryEntry::new(
                    "alice",
                    HistoryDataType::UserExecutedSql,
                    format!("SELECT {}", i),
                ))
                .await
                .unwrap();
        }
        storage
            .append(HistoryEntry::new("alice", HistoryDataType::UserPrompt, "[]"))
            .await
            .unwrap();

        let filter = HistoryFilter {
            data_type: Some(HistoryDataType::UserExecutedSql),
            limit: Some(2),
            ..Default::default()
        };
        let results = storage.query(&filter).await.unwrap();
        let contents: Vec<&str> = results.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["SELECT 3", "SELECT 4"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let storage =
            std::sync::Arc::new(FileStorage::new(dir.path().join("history.jsonl")).unwrap());

        let mut handles = Vec::new();
        for i in 0..16 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage
                    .append(HistoryEntry::new(
                        format!("user{}", i),
                        HistoryDataType::GeneratedSql,
                        "SELECT 1",
                    ))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(storage.query(&HistoryFilter::default()).await.unwrap().len(), 16);
    }

    #[test]
    fn test_create_storage_disabled_is_null() {
        let config = AuditConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(create_storage(&config).is_ok());
    }
}
