//! Read-only policy store.
//!
//! The resolver only ever reads selector records through [`PolicyStore`];
//! it never depends on how they are persisted.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::model::{
    DataSource, DataSourceId, ForeignKey, PrivateColumnSelector, PrivateTableSelector,
    RoleColumnSelector, RoleRowFilter, RoleSet, RoleTableSelector, Table, TableColumn, TableId,
    TableRowFilter,
};

/// Errors surfaced by a policy store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("policy store unavailable: {0}")]
    Unavailable(String),
}

/// Query-by-filter access to catalog and selector records.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn data_source(&self, id: DataSourceId) -> Result<Option<DataSource>, StoreError>;

    async fn data_sources(&self) -> Result<Vec<DataSource>, StoreError>;

    /// All tables of a data source, in declaration order.
    async fn tables(&self, data_source: DataSourceId) -> Result<Vec<Table>, StoreError>;

    /// All columns belonging to the given tables, in declaration order.
    async fn columns(&self, tables: &[TableId]) -> Result<Vec<TableColumn>, StoreError>;

    async fn private_tables(
        &self,
        data_source: DataSourceId,
    ) -> Result<Option<PrivateTableSelector>, StoreError>;

    async fn role_table_selectors(
        &self,
        roles: &RoleSet,
    ) -> Result<Vec<RoleTableSelector>, StoreError>;

    async fn private_columns(
        &self,
        data_source: DataSourceId,
    ) -> Result<Option<PrivateColumnSelector>, StoreError>;

    async fn role_column_selectors(
        &self,
        roles: &RoleSet,
    ) -> Result<Vec<RoleColumnSelector>, StoreError>;

    async fn base_row_filters(
        &self,
        data_source: DataSourceId,
    ) -> Result<Vec<TableRowFilter>, StoreError>;

    async fn role_row_filters(
        &self,
        data_source: DataSourceId,
        roles: &RoleSet,
    ) -> Result<Vec<RoleRowFilter>, StoreError>;

    /// Roles held by a user. Unknown users hold no roles.
    async fn user_roles(&self, username: &str) -> Result<RoleSet, StoreError>;

    /// Declared foreign keys whose declaring table is one of `tables`.
    async fn foreign_keys(&self, _tables: &[TableId]) -> Result<Vec<ForeignKey>, StoreError> {
        Ok(Vec::new())
    }

    /// An enabled data source by id.
    async fn enabled_data_source(
        &self,
        id: DataSourceId,
    ) -> Result<Option<DataSource>, StoreError> {
        Ok(self.data_source(id).await?.filter(|ds| ds.enabled))
    }
}

/// Policy store backed by an in-memory [`Catalog`].
///
/// The catalog can be swapped as a whole (e.g. after the catalog file is
/// edited); readers always see a consistent snapshot.
pub struct MemoryPolicyStore {
    catalog: RwLock<Arc<Catalog>>,
}

impl MemoryPolicyStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Replace the catalog. Callers must invalidate any cached policies.
    pub fn replace(&self, catalog: Catalog) -> Result<(), StoreError> {
        let mut guard = self
            .catalog
            .write()
            .map_err(|e| StoreError::Unavailable(format!("catalog lock poisoned: {}", e)))?;
        *guard = Arc::new(catalog);
        Ok(())
    }

    fn snapshot(&self) -> Result<Arc<Catalog>, StoreError> {
        self.catalog
            .read()
            .map(|c| Arc::clone(&c))
            .map_err(|e| StoreError::Unavailable(format!("catalog lock poisoned: {}", e)))
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn data_source(&self, id: DataSourceId) -> Result<Option<DataSource>, StoreError> {
        let catalog = self.snapshot()?;
        Ok(catalog.data_sources.iter().find(|d| d.id == id).cloned())
    }

    async fn data_sources(&self) -> Result<Vec<DataSource>, StoreError> {
        Ok(self.snapshot()?.data_sources.clone())
    }

    async fn tables(&self, data_source: DataSourceId) -> Result<Vec<Table>, StoreError> {
        let catalog = self.snapshot()?;
        Ok(catalog
            .tables
            .iter()
            .filter(|t| t.data_source == data_source)
            .cloned()
            .collect())
    }

    async fn columns(&self, tables: &[TableId]) -> Result<Vec<TableColumn>, StoreError> {
        let catalog = self.snapshot()?;
        Ok(catalog
            .columns
            .iter()
            .filter(|c| tables.contains(&c.table))
            .cloned()
            .collect())
    }

    async fn private_tables(
        &self,
        data_source: DataSourceId,
    ) -> Result<Option<PrivateTableSelector>, StoreError> {
        let catalog = self.snapshot()?;
        Ok(catalog
            .private_tables
            .iter()
            .find(|s| s.data_source == data_source)
            .cloned())
    }

    async fn role_table_selectors(
        &self,
        roles: &RoleSet,
    ) -> Result<Vec<RoleTableSelector>, StoreError> {
        let catalog = self.snapshot()?;
        Ok(catalog
            .role_tables
            .iter()
            .filter(|s| roles.contains(&s.role))
            .cloned()
            .collect())
    }

    async fn private_columns(
        &self,
        data_source: DataSourceId,
    ) -> Result<Option<PrivateColumnSelector>, StoreError> {
        let catalog = self.snapshot()?;
        Ok(catalog
            .private_columns
            .iter()
            .find(|s| s.data_source == data_source)
            .cloned())
    }

    async fn role_column_selectors(
        &self,
        roles: &RoleSet,
    ) -> Result<Vec<RoleColumnSelector>, StoreError> {
        let catalog = self.snapshot()?;
        Ok(catalog
            .role_columns
            .iter()
            .filter(|s| roles.contains(&s.role))
            .cloned()
            .collect())
    }

    async fn base_row_filters(
        &self,
        data_source: DataSourceId,
    ) -> Result<Vec<TableRowFilter>, StoreError> {
        let catalog = self.snapshot()?;
        Ok(catalog
            .base_filters
            .iter()
            .filter(|f| f.data_source == data_source)
            .cloned()
            .collect())
    }

    async fn role_row_filters(
        &self,
        data_source: DataSourceId,
        roles: &RoleSet,
    ) -> Result<Vec<RoleRowFilter>, StoreError> {
        let catalog = self.snapshot()?;
        Ok(catalog
            .role_filters
            .iter()
            .filter(|f| f.data_source == data_source && roles.contains(&f.role))
            .cloned()
            .collect())
    }

    async fn foreign_keys(&self, tables: &[TableId]) -> Result<Vec<ForeignKey>, StoreError> {
        let catalog = self.snapshot()?;
        Ok(catalog
            .foreign_keys
            .iter()
            .filter(|fk| tables.contains(&fk.table))
            .cloned()
            .collect())
    }

    async fn user_roles(&self, username: &str) -> Result<RoleSet, StoreError> {
        let catalog = self.snapshot()?;
        Ok(catalog
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.roles.iter().cloned().collect())
            .unwrap_or_default())
    }
}
