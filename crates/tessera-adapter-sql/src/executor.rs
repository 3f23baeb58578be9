//! Statement execution over per-data-source connection pools.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Executor, Row, ValueRef};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tessera_core::{DataSource, DataSourceId, ExecutionConfig};
use tokio::sync::RwLock;

use crate::error::ExecutionError;
use crate::pagination::{PagedResult, paginate};

/// Runs native statements and pages their results.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(
        &self,
        data_source: &DataSource,
        sql: &str,
        page: u64,
        page_size: u64,
    ) -> Result<PagedResult, ExecutionError>;
}

struct PoolEntry {
    connection_str: String,
    pool: AnyPool,
}

/// Executor backed by `sqlx` `Any` pools, one per data source.
///
/// Pools are opened lazily on first use. A data source whose connection
/// string changed since its pool was opened gets a fresh pool.
pub struct SqlExecutor {
    pools: RwLock<HashMap<DataSourceId, PoolEntry>>,
    max_connections: u32,
    timeout: Option<Duration>,
}

impl SqlExecutor {
    pub fn new(config: &ExecutionConfig) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            pools: RwLock::new(HashMap::new()),
            max_connections: config.max_connections,
            timeout: config.timeout(),
        }
    }

    /// The pool of `data_source`, connecting if needed.
    pub async fn pool(&self, data_source: &DataSource) -> Result<AnyPool, ExecutionError> {
        {
            let pools = self.pools.read().await;
            if let Some(entry) = pools.get(&data_source.id) {
                if entry.connection_str == data_source.connection_str {
                    return Ok(entry.pool.clone());
                }
            }
        }

        let mut pools = self.pools.write().await;
        // Another task may have connected while we waited for the lock.
        if let Some(entry) = pools.get(&data_source.id) {
            if entry.connection_str == data_source.connection_str {
                return Ok(entry.pool.clone());
            }
        }

        let pool = AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&data_source.connection_str)
            .await?;
        tracing::info!(
            data_source = data_source.id.0,
            kind = %data_source.kind,
            "Opened connection pool"
        );

        if let Some(stale) = pools.insert(
            data_source.id,
            PoolEntry {
                connection_str: data_source.connection_str.clone(),
                pool: pool.clone(),
            },
        ) {
            stale.pool.close().await;
        }
        Ok(pool)
    }

    /// Close and forget every pool.
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (_, entry) in pools.drain() {
            entry.pool.close().await;
        }
    }

    /// Run `sql` and return its output column names and all rows as
    /// ordered JSON objects.
    pub async fn fetch_rows(
        &self,
        data_source: &DataSource,
        sql: &str,
    ) -> Result<(Vec<String>, Vec<Map<String, Value>>), ExecutionError> {
        let pool = self.pool(data_source).await?;
        let rows = self.bounded(sqlx::query(sql).fetch_all(&pool)).await?;

        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            // No row to read names from; ask the driver for the statement's output.
            None => self
                .bounded(pool.describe(sql))
                .await?
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        };
        let data = rows.iter().map(row_to_json).collect();
        Ok((columns, data))
    }

    /// Await a driver call under the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, ExecutionError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ExecutionError::Timeout(limit))?
                .map_err(ExecutionError::from),
            None => call.await.map_err(ExecutionError::from),
        }
    }
}

#[async_trait]
impl QueryExecutor for SqlExecutor {
    async fn execute(
        &self,
        data_source: &DataSource,
        sql: &str,
        page: u64,
        page_size: u64,
    ) -> Result<PagedResult, ExecutionError> {
        if page < 1 || page_size < 1 {
            return Err(ExecutionError::InvalidPagination { page, page_size });
        }

        let (columns, rows) = self.fetch_rows(data_source, sql).await?;
        tracing::debug!(
            data_source = data_source.id.0,
            rows = rows.len(),
            page,
            page_size,
            "Statement executed"
        );
        paginate(columns, rows, page, page_size)
    }
}

/// Convert an `AnyRow` to a JSON object keyed by output column name.
///
/// Output columns sharing a name collapse into one key holding the last
/// value, at the position of the first. `columns` still lists every name,
/// so callers wanting all values should alias the duplicates apart.
fn row_to_json(row: &AnyRow) -> Map<String, Value> {
    let mut obj = Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        obj.insert(col.name().to_string(), column_value(row, i));
    }
    obj
}

fn column_value(row: &AnyRow, i: usize) -> Value {
    match row.try_get_raw(i) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    if let Ok(v) = row.try_get::<i64, _>(i) {
        json!(v)
    } else if let Ok(v) = row.try_get::<f64, _>(i) {
        json!(v)
    } else if let Ok(v) = row.try_get::<bool, _>(i) {
        json!(v)
    } else if let Ok(v) = row.try_get::<String, _>(i) {
        json!(v)
    } else if let Ok(v) = row.try_get::<Vec<u8>, _>(i) {
        json!(String::from_utf8_lossy(&v))
    } else {
        tracing::debug!(column = i, "Unsupported column type, returning null");
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tessera_core::DbKind;

    async fn sqlite_source(dir: &tempfile::TempDir, setup: &[&str]) -> DataSource {
        let path = dir.path().join("test.db");
        let source = DataSource {
            id: DataSourceId(1),
            display_name: "test".to_string(),
            kind: DbKind::Sqlite,
            connection_str: format!("sqlite://{}?mode=rwc", path.display()),
            enabled: true,
            dialect_version: None,
        };

        sqlx::any::install_default_drivers();
        let pool = AnyPool::connect(&source.connection_str).await.unwrap();
        for stmt in setup {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        pool.close().await;
        source
    }

    #[tokio::test]
    async fn test_rows_keep_statement_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let source = sqlite_source(
            &dir,
            &[
                "CREATE TABLE albums_tbl (id INTEGER, title TEXT, price REAL)",
                "INSERT INTO albums_tbl VALUES (1, 'Facelift', 9.99), (2, NULL, 0.5)",
            ],
        )
        .await;
        let executor = SqlExecutor::new(&ExecutionConfig::default());

        let result = executor
            .execute(
                &source,
                "SELECT title AS Title, id AS AlbumId, price FROM albums_tbl ORDER BY id",
                1,
                25,
            )
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["Title", "AlbumId", "price"]);
        assert_eq!(result.row_count, 2);
        assert_eq!(
            serde_json::to_string(&result.data[0]).unwrap(),
            r#"{"Title":"Facelift","AlbumId":1,"price":9.99}"#
        );
        assert_eq!(result.data[1]["Title"], Value::Null);
    }

    #[tokio::test]
    async fn test_empty_result_keeps_column_names() {
        let dir = tempfile::tempdir().unwrap();
        let source = sqlite_source(
            &dir,
            &["CREATE TABLE Album (AlbumId INTEGER, Title TEXT)"],
        )
        .await;
        let executor = SqlExecutor::new(&ExecutionConfig::default());

        let result = executor
            .execute(&source, "SELECT AlbumId, Title FROM Album WHERE 1=0", 1, 25)
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["AlbumId", "Title"]);
        assert_eq!(result.row_count, 0);
        assert_eq!(result.total_pages, 0);
        assert!(result.data.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_column_names_collapse_in_rows() {
        let dir = tempfile::tempdir().unwrap();
        let source = sqlite_source(
            &dir,
            &[
                "CREATE TABLE a (Id INTEGER)",
                "CREATE TABLE b (Id INTEGER)",
                "INSERT INTO a VALUES (1)",
                "INSERT INTO b VALUES (2)",
            ],
        )
        .await;
        let executor = SqlExecutor::new(&ExecutionConfig::default());

        let result = executor
            .execute(&source, "SELECT a.Id, b.Id FROM a CROSS JOIN b", 1, 25)
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["Id", "Id"]);
        assert_eq!(result.data[0].len(), 1);
        assert_eq!(result.data[0]["Id"], json!(2));
    }

    #[tokio::test]
    async fn test_pagination_over_database_rows() {
        let dir = tempfile::tempdir().unwrap();
        let source = sqlite_source(
            &dir,
            &[
                "CREATE TABLE t (n INTEGER)",
                "WITH RECURSIVE c(x) AS (SELECT 0 UNION ALL SELECT x + 1 FROM c WHERE x < 346) \
                 INSERT INTO t SELECT x FROM c",
            ],
        )
        .await;
        let executor = SqlExecutor::new(&ExecutionConfig::default());

        let first = executor
            .execute(&source, "SELECT n FROM t ORDER BY n", 1, 25)
            .await
            .unwrap();
        assert_eq!(first.total_pages, 13);
        assert_eq!(first.data.len(), 25);
        assert_eq!(first.data[0]["n"], json!(0));

        let beyond = executor
            .execute(&source, "SELECT n FROM t ORDER BY n", 14, 25)
            .await
            .unwrap();
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.row_count, 347);
    }

    #[tokio::test]
    async fn test_driver_message_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let source = sqlite_source(&dir, &[]).await;
        let executor = SqlExecutor::new(&ExecutionConfig::default());

        let err = executor
            .execute(&source, "SELECT * FROM missing_table", 1, 25)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no such table: missing_table");
    }

    #[tokio::test]
    async fn test_invalid_pagination_skips_database() {
        let executor = SqlExecutor::new(&ExecutionConfig::default());
        let source = DataSource {
            id: DataSourceId(9),
            display_name: "unreachable".to_string(),
            kind: DbKind::Postgres,
            connection_str: "postgres://nobody@127.0.0.1:1/none".to_string(),
            enabled: true,
            dialect_version: None,
        };
        let err = executor.execute(&source, "SELECT 1", 0, 25).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidPagination { .. }));
    }

    #[tokio::test]
    async fn test_pool_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let source = sqlite_source(&dir, &[]).await;
        let executor = SqlExecutor::new(&ExecutionConfig::default());

        executor.pool(&source).await.unwrap();
        executor.pool(&source).await.unwrap();
        assert_eq!(executor.pools.read().await.len(), 1);

        executor.close_all().await;
        assert!(executor.pools.read().await.is_empty());
    }
}
