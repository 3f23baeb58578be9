//! Physical schema discovery.

use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;
use tessera_core::{DataSource, DbKind, PolicyStore};
use tessera_rls::{PhysicalColumn, PhysicalForeignKey, PhysicalSchema, PhysicalTable};

use crate::error::{ExecutionError, IntrospectError};
use crate::executor::SqlExecutor;

#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    async fn physical_schema(&self, data_source: &DataSource)
    -> Result<PhysicalSchema, IntrospectError>;
}

/// Describes a data source from the table and column records of the catalog.
pub struct CatalogIntrospector {
    store: Arc<dyn PolicyStore>,
}

impl CatalogIntrospector {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SchemaIntrospector for CatalogIntrospector {
    async fn physical_schema(
        &self,
        data_source: &DataSource,
    ) -> Result<PhysicalSchema, IntrospectError> {
        let tables = self.store.tables(data_source.id).await?;
        let ids: Vec<_> = tables.iter().map(|t| t.id).collect();
        let columns = self.store.columns(&ids).await?;
        let foreign_keys = self.store.foreign_keys(&ids).await?;
        Ok(PhysicalSchema::from_catalog(&tables, &columns, &foreign_keys))
    }
}

/// Reads tables and columns from the database's own catalog.
pub struct LiveIntrospector {
    executor: Arc<SqlExecutor>,
}

impl LiveIntrospector {
    pub fn new(executor: Arc<SqlExecutor>) -> Self {
        Self { executor }
    }
}

/// Catalog query yielding `(table_name, column_name, data_type)` rows
/// grouped by table, columns in ordinal order.
fn columns_query(kind: DbKind) -> Option<&'static str> {
    match kind {
        DbKind::Postgres => Some(
            r#"
            select table_name::text as table_name,
                   column_name::text as column_name,
                   data_type::text as data_type
            from information_schema.columns
            where table_schema = current_schema()
            order by table_name, ordinal_position
            "#,
        ),
        DbKind::Mysql => Some(
            r#"
            select cast(table_name as char) as table_name,
                   cast(column_name as char) as column_name,
                   cast(column_type as char) as data_type
            from information_schema.columns
            where table_schema = database()
            order by table_name, ordinal_position
            "#,
        ),
        DbKind::Sqlite => Some(
            r#"
            select m.name as table_name, p.name as column_name, p.type as data_type
            from sqlite_master m
            join pragma_table_info(m.name) p
            where m.type in ('table', 'view') and m.name not like 'sqlite_%'
            order by m.name, p.cid
            "#,
        ),
        DbKind::Generic | DbKind::Oracle => None,
    }
}

/// Catalog query yielding one row per foreign key column as
/// `(table_name, constraint_name, column_name, foreign_table_name,
/// foreign_column_name)`, grouped by table then constraint, columns in key
/// order.
fn foreign_keys_query(kind: DbKind) -> Option<&'static str> {
    match kind {
        DbKind::Postgres => Some(
            r#"
            select kcu.table_name::text as table_name,
                   kcu.constraint_name::text as constraint_name,
                   kcu.column_name::text as column_name,
                   rku.table_name::text as foreign_table_name,
                   rku.column_name::text as foreign_column_name
            from information_schema.referential_constraints rc
            join information_schema.key_column_usage kcu
              on kcu.constraint_schema = rc.constraint_schema
             and kcu.constraint_name = rc.constraint_name
            join information_schema.key_column_usage rku
              on rku.constraint_schema = rc.unique_constraint_schema
             and rku.constraint_name = rc.unique_constraint_name
             and rku.ordinal_position = kcu.position_in_unique_constraint
            where kcu.table_schema = current_schema()
            order by kcu.table_name, kcu.constraint_name, kcu.ordinal_position
            "#,
        ),
        DbKind::Mysql => Some(
            r#"
            select cast(table_name as char) as table_name,
                   cast(constraint_name as char) as constraint_name,
                   cast(column_name as char) as column_name,
                   cast(referenced_table_name as char) as foreign_table_name,
                   cast(referenced_column_name as char) as foreign_column_name
            from information_schema.key_column_usage
            where table_schema = database() and referenced_table_name is not null
            order by table_name, constraint_name, ordinal_position
            "#,
        ),
        // A reference without target columns points at the primary key.
        DbKind::Sqlite => Some(
            r#"
            select m.name as table_name,
                   cast(f.id as text) as constraint_name,
                   f."from" as column_name,
                   f."table" as foreign_table_name,
                   coalesce(
                     f."to",
                     (select p.name from pragma_table_info(f."table") p where p.pk = f.seq + 1)
                   ) as foreign_column_name
            from sqlite_master m
            join pragma_foreign_key_list(m.name) f
            where m.type = 'table' and m.name not like 'sqlite_%'
            order by m.name, f.id, f.seq
            "#,
        ),
        DbKind::Generic | DbKind::Oracle => None,
    }
}

impl LiveIntrospector {
    /// Foreign keys of the data source, keyed by declaring table name.
    async fn foreign_keys(
        &self,
        pool: &sqlx::AnyPool,
        query: &str,
    ) -> Result<Vec<(String, PhysicalForeignKey)>, IntrospectError> {
        let rows = sqlx::query(query)
            .fetch_all(pool)
            .await
            .map_err(ExecutionError::from)?;

        let mut keys: Vec<(String, String, PhysicalForeignKey)> = Vec::new();
        for row in rows {
            let table_name: String = row.try_get("table_name").map_err(ExecutionError::from)?;
            let constraint: String =
                row.try_get("constraint_name").map_err(ExecutionError::from)?;
            let column: String = row.try_get("column_name").map_err(ExecutionError::from)?;
            let foreign_table: String =
                row.try_get("foreign_table_name").map_err(ExecutionError::from)?;
            let foreign_column: Option<String> =
                row.try_get("foreign_column_name").map_err(ExecutionError::from)?;
            let Some(foreign_column) = foreign_column else {
                tracing::debug!(
                    table = %table_name,
                    constraint = %constraint,
                    "Foreign key target column unknown"
                );
                continue;
            };

            match keys.last_mut() {
                Some((table, name, key)) if *table == table_name && *name == constraint => {
                    key.columns.push(column);
                    key.references_columns.push(foreign_column);
                }
                _ => keys.push((
                    table_name,
                    constraint,
                    PhysicalForeignKey {
                        columns: vec![column],
                        references_table: foreign_table,
                        references_columns: vec![foreign_column],
                    },
                )),
            }
        }

        Ok(keys
            .into_iter()
            .map(|(table, _, key)| (table, key))
            .collect())
    }
}

#[async_trait]
impl SchemaIntrospector for LiveIntrospector {
    async fn physical_schema(
        &self,
        data_source: &DataSource,
    ) -> Result<PhysicalSchema, IntrospectError> {
        let query =
            columns_query(data_source.kind).ok_or(IntrospectError::Unsupported(data_source.kind))?;

        let pool = self.executor.pool(data_source).await?;
        let rows = sqlx::query(query)
            .fetch_all(&pool)
            .await
            .map_err(ExecutionError::from)?;

        let mut tables: Vec<PhysicalTable> = Vec::new();
        for row in rows {
            let table_name: String = row.try_get("table_name").map_err(ExecutionError::from)?;
            let column_name: String = row.try_get("column_name").map_err(ExecutionError::from)?;
            let data_type: Option<String> =
                row.try_get("data_type").map_err(ExecutionError::from)?;

            let column = PhysicalColumn {
                name: column_name,
                data_type: data_type.unwrap_or_default(),
            };
            match tables.last_mut() {
                Some(table) if table.name == table_name => table.columns.push(column),
                _ => {
                    let mut table = PhysicalTable::new(table_name);
                    table.columns.push(column);
                    tables.push(table);
                }
            }
        }

        let mut foreign_keys = 0;
        if let Some(query) = foreign_keys_query(data_source.kind) {
            for (table_name, key) in self.foreign_keys(&pool, query).await? {
                if let Some(table) = tables.iter_mut().find(|t| t.name == table_name) {
                    table.foreign_keys.push(key);
                    foreign_keys += 1;
                }
            }
        }

        tracing::debug!(
            data_source = data_source.id.0,
            tables = tables.len(),
            foreign_keys,
            "Introspected physical schema"
        );
        Ok(PhysicalSchema::new(tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tessera_core::{Catalog, DataSourceId, ExecutionConfig, MemoryPolicyStore};

    #[tokio::test]
    async fn test_catalog_introspector() {
        let catalog = Catalog::from_yaml(
            r#"
datasources:
  - id: 1
    display_name: chinook
    kind: sqlite
    connection_str: "sqlite::memory:"
    tables:
      - name: albums_tbl
        pub_name: Album
        columns:
          - { name: album_id, pub_name: AlbumId, data_type: INTEGER }
          - { name: title, data_type: "NVARCHAR(160)" }
          - { name: artist_id, data_type: INTEGER }
        foreign_keys:
          - columns: [artist_id]
            references: { table: artists_tbl, columns: [id] }
      - name: artists_tbl
        columns:
          - { name: id, data_type: INTEGER }
"#,
        )
        .unwrap();
        let store = Arc::new(MemoryPolicyStore::new(catalog));
        let source = store.data_source(DataSourceId(1)).await.unwrap().unwrap();

        let schema = CatalogIntrospector::new(store)
            .physical_schema(&source)
            .await
            .unwrap();
        let table = schema.table("albums_tbl").unwrap();
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.column("title").unwrap().data_type, "NVARCHAR(160)");
        assert_eq!(
            table.foreign_keys,
            vec![PhysicalForeignKey {
                columns: vec!["artist_id".to_string()],
                references_table: "artists_tbl".to_string(),
                references_columns: vec!["id".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_live_introspector_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let source = DataSource {
            id: DataSourceId(1),
            display_name: "live".to_string(),
            kind: DbKind::Sqlite,
            connection_str: format!("sqlite://{}?mode=rwc", dir.path().join("live.db").display()),
            enabled: true,
            dialect_version: None,
        };
        let executor = Arc::new(SqlExecutor::new(&ExecutionConfig::default()));
        let pool = executor.pool(&source).await.unwrap();
        sqlx::query("CREATE TABLE artists (id INTEGER PRIMARY KEY, name TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE albums (id INTEGER PRIMARY KEY, \
             artist_id INTEGER REFERENCES artists (id), title VARCHAR(160))",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("CREATE TABLE tracks (id INTEGER, album_id INTEGER REFERENCES albums)")
            .execute(&pool)
            .await
            .unwrap();

        let schema = LiveIntrospector::new(executor)
            .physical_schema(&source)
            .await
            .unwrap();

        let names: Vec<&str> = schema.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["albums", "artists", "tracks"]);
        let albums = schema.table("albums").unwrap();
        let columns: Vec<&str> = albums.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, vec!["id", "artist_id", "title"]);
        assert_eq!(albums.column("title").unwrap().data_type, "VARCHAR(160)");
        assert_eq!(
            albums.foreign_keys,
            vec![PhysicalForeignKey {
                columns: vec!["artist_id".to_string()],
                references_table: "artists".to_string(),
                references_columns: vec!["id".to_string()],
            }]
        );

        // No target column: the referenced primary key is filled in.
        let tracks = schema.table("tracks").unwrap();
        assert_eq!(tracks.foreign_keys[0].references_table, "albums");
        assert_eq!(tracks.foreign_keys[0].references_columns, vec!["id"]);
        assert!(schema.table("artists").unwrap().foreign_keys.is_empty());
    }

    #[tokio::test]
    async fn test_live_introspector_unsupported_kind() {
        let source = DataSource {
            id: DataSourceId(2),
            display_name: "ora".to_string(),
            kind: DbKind::Oracle,
            connection_str: "oracle://localhost".to_string(),
            enabled: true,
            dialect_version: None,
        };
        let executor = Arc::new(SqlExecutor::new(&ExecutionConfig::default()));
        let err = LiveIntrospector::new(executor)
            .physical_schema(&source)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "live introspection is not supported for oracle data sources"
        );
    }
}
