//! Effective policy resolution.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tessera_core::{
    ColumnId, DataSourceId, PolicyStore, RoleSet, Table, TableColumn, TableId,
};

use crate::cache::PolicyCache;
use crate::error::PolicyError;
use crate::filters::compose_table_filters;

/// What a role set may see in one data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePolicy {
    pub data_source: DataSourceId,
    pub roles: RoleSet,
    /// Visible tables, in catalog order.
    pub tables: Vec<Table>,
    /// Visible columns of visible tables, in catalog order.
    pub columns: Vec<TableColumn>,
    /// Composed `WHERE …` clause per visible table that has one.
    pub filters: BTreeMap<TableId, String>,
}

impl EffectivePolicy {
    pub fn is_table_visible(&self, table: TableId) -> bool {
        self.tables.iter().any(|t| t.id == table)
    }

    pub fn is_column_visible(&self, column: ColumnId) -> bool {
        self.columns.iter().any(|c| c.id == column)
    }

    /// Visible columns of one table.
    pub fn columns_of(&self, table: TableId) -> impl Iterator<Item = &TableColumn> {
        self.columns.iter().filter(move |c| c.table == table)
    }

    pub fn filter_for(&self, table: TableId) -> Option<&str> {
        self.filters.get(&table).map(String::as_str)
    }
}

/// Computes [`EffectivePolicy`] values from a [`PolicyStore`].
#[derive(Clone)]
pub struct PolicyResolver {
    store: Arc<dyn PolicyStore>,
    cache: Option<Arc<PolicyCache>>,
}

impl PolicyResolver {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store, cache: None }
    }

    /// Serve repeated resolutions from `cache`.
    pub fn with_cache(mut self, cache: Arc<PolicyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn store(&self) -> &Arc<dyn PolicyStore> {
        &self.store
    }

    /// Resolve the policy for `roles` in `data_source`, consulting the cache.
    pub async fn resolve(
        &self,
        data_source: DataSourceId,
        roles: &RoleSet,
    ) -> Result<Arc<EffectivePolicy>, PolicyError> {
        if let Some(cache) = &self.cache {
            if let Some(policy) = cache.get(data_source, roles) {
                tracing::trace!(data_source = %data_source, roles = %roles, "Policy cache hit");
                return Ok(policy);
            }
        }

        let policy = Arc::new(self.resolve_uncached(data_source, roles).await?);

        if let Some(cache) = &self.cache {
            cache.insert(Arc::clone(&policy));
        }
        Ok(policy)
    }

    /// Resolve directly from the store.
    pub async fn resolve_uncached(
        &self,
        data_source: DataSourceId,
        roles: &RoleSet,
    ) -> Result<EffectivePolicy, PolicyError> {
        // Tables
        let all_tables = self.store.tables(data_source).await?;
        let table_universe: BTreeSet<TableId> = all_tables.iter().map(|t| t.id).collect();
        let table_deny = self
            .store
            .private_tables(data_source)
            .await?
            .map(|s| s.tables)
            .unwrap_or_default();
        let table_selectors = self.store.role_table_selectors(roles).await?;

        let visible_tables = narrow(
            &table_universe,
            &table_deny,
            table_selectors.iter().flat_map(|s| s.include.iter().copied()),
            table_selectors.iter().flat_map(|s| s.exclude.iter().copied()),
        );

        let tables: Vec<Table> = all_tables
            .into_iter()
            .filter(|t| visible_tables.contains(&t.id))
            .collect();

        // Columns of surviving tables
        let table_ids: Vec<TableId> = tables.iter().map(|t| t.id).collect();
        let all_columns = self.store.columns(&table_ids).await?;
        let column_universe: BTreeSet<ColumnId> = all_columns.iter().map(|c| c.id).collect();
        let column_deny = self
            .store
            .private_columns(data_source)
            .await?
            .map(|s| s.columns)
            .unwrap_or_default();
        let column_selectors = self.store.role_column_selectors(roles).await?;

        let visible_columns = narrow(
            &column_universe,
            &column_deny,
            column_selectors.iter().flat_map(|s| s.include.iter().copied()),
            column_selectors.iter().flat_map(|s| s.exclude.iter().copied()),
        );

        let columns: Vec<TableColumn> = all_columns
            .into_iter()
            .filter(|c| visible_columns.contains(&c.id))
            .collect();

        // Row filters of surviving tables
        let base_filters = self.store.base_row_filters(data_source).await?;
        let role_filters = self.store.role_row_filters(data_source, roles).await?;
        let mut filters = compose_table_filters(&base_filters, &role_filters);
        filters.retain(|table, _| visible_tables.contains(table));

        tracing::debug!(
            data_source = %data_source,
            roles = %roles,
            tables = tables.len(),
            columns = columns.len(),
            filtered_tables = filters.len(),
            "Resolved effective policy"
        );

        Ok(EffectivePolicy {
            data_source,
            roles: roles.clone(),
            tables,
            columns,
            filters,
        })
    }
}

/// Apply the deny / include-override / exclude algebra to `universe`.
///
/// Includes outside the universe are ignored. When at least one include
/// remains it replaces the candidate set rather than intersecting it. The
/// deny-list holds regardless of includes.
fn narrow<T: Ord + Copy>(
    universe: &BTreeSet<T>,
    deny: &[T],
    includes: impl Iterator<Item = T>,
    excludes: impl Iterator<Item = T>,
) -> BTreeSet<T> {
    let deny: BTreeSet<T> = deny.iter().copied().collect();

    let included: BTreeSet<T> = includes.filter(|id| universe.contains(id)).collect();
    let mut candidate: BTreeSet<T> = if included.is_empty() {
        universe.clone()
    } else {
        included
    };
    candidate.retain(|id| !deny.contains(id));

    for id in excludes {
        candidate.remove(&id);
    }
    candidate
}
