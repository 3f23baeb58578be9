//! Catalog file format.
//!
//! The catalog describes data sources, their tables and columns, and the
//! selector records that restrict them. It is written by administrators as
//! YAML and refers to tables by name and to columns as `Table.Column`; on
//! load every record is assigned a stable numeric id (declaration order)
//! and every reference is resolved, so an unknown name fails the load
//! instead of silently widening access.
//!
//! ```yaml
//! users:
//!   - username: alice
//!     roles: [sales]
//! datasources:
//!   - id: 1
//!     display_name: chinook
//!     kind: sqlite
//!     connection_str: sqlite://chinook.db
//!     tables:
//!       - name: Invoice
//!         columns:
//!           - { name: InvoiceId, data_type: INTEGER }
//!           - { name: Total, data_type: NUMERIC }
//!         row_filters: ["Total > 0"]
//!         foreign_keys:
//!           - columns: [CustomerId]
//!             references: { table: Customer, columns: [CustomerId] }
//!     private_tables: [Invoice]
//!     roles:
//!       sales:
//!         include_tables: [Invoice]
//!         exclude_columns: [Invoice.Total]
//!         row_filters:
//!           Invoice: ["BillingCountry = 'USA'"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::model::{
    ColumnId, DataSource, DataSourceId, DbKind, ForeignKey, PrivateColumnSelector, PrivateTableSelector,
    RoleColumnSelector, RoleRowFilter, RoleTableSelector, Table, TableColumn, TableId,
    TableRowFilter, User,
};

/// Errors raised while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("duplicate data source id {0}")]
    DuplicateDataSource(DataSourceId),

    #[error("data source {data_source}: unknown table '{table}'")]
    UnknownTable {
        data_source: DataSourceId,
        table: String,
    },

    #[error("data source {data_source}: unknown column '{column}' (expected Table.Column)")]
    UnknownColumn {
        data_source: DataSourceId,
        column: String,
    },

    #[error(
        "data source {data_source}: foreign key on '{table}' maps {columns} column(s) to {references} referenced column(s)"
    )]
    ForeignKeyArity {
        data_source: DataSourceId,
        table: String,
        columns: usize,
        references: usize,
    },
}

/// Catalog as written on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub datasources: Vec<DataSourceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceEntry {
    pub id: i64,
    pub display_name: String,
    #[serde(default)]
    pub kind: DbKind,
    pub connection_str: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub dialect_version: Option<String>,
    #[serde(default)]
    pub tables: Vec<TableEntry>,
    /// Tables hidden from every role.
    #[serde(default)]
    pub private_tables: Vec<String>,
    /// Columns hidden from every role, as `Table.Column`.
    #[serde(default)]
    pub private_columns: Vec<String>,
    /// Per-role selectors, keyed by role name.
    #[serde(default)]
    pub roles: BTreeMap<String, RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    pub name: String,
    #[serde(default)]
    pub pub_name: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnEntry>,
    /// Base filters applied for every role.
    #[serde(default)]
    pub row_filters: Vec<String>,
    /// References to other tables of the same data source, rendered into
    /// prompt DDL when both ends are visible.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyEntry {
    /// Column names of the declaring table.
    pub columns: Vec<String>,
    pub references: ForeignKeyRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnEntry {
    pub name: String,
    #[serde(default)]
    pub pub_name: Option<String>,
    #[serde(default)]
    pub data_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleEntry {
    #[serde(default)]
    pub include_tables: Vec<String>,
    #[serde(default)]
    pub exclude_tables: Vec<String>,
    #[serde(default)]
    pub include_columns: Vec<String>,
    #[serde(default)]
    pub exclude_columns: Vec<String>,
    /// Row filters keyed by table name.
    #[serde(default)]
    pub row_filters: BTreeMap<String, Vec<String>>,
}

/// Resolved catalog with numeric ids, as served by the policy store.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub data_sources: Vec<DataSource>,
    pub tables: Vec<Table>,
    pub columns: Vec<TableColumn>,
    pub private_tables: Vec<PrivateTableSelector>,
    pub role_tables: Vec<RoleTableSelector>,
    pub private_columns: Vec<PrivateColumnSelector>,
    pub role_columns: Vec<RoleColumnSelector>,
    pub base_filters: Vec<TableRowFilter>,
    pub role_filters: Vec<RoleRowFilter>,
    pub foreign_keys: Vec<ForeignKey>,
    pub users: Vec<User>,
}

impl Catalog {
    /// Load and resolve a catalog file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and resolve catalog YAML.
    pub fn from_yaml(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(content)?;
        Self::resolve(file)
    }

    /// Assign ids and resolve name references.
    pub fn resolve(file: CatalogFile) -> Result<Self, CatalogError> {
        let mut catalog = Catalog {
            users: file.users,
            ..Default::default()
        };
        let mut next_table = 1;
        let mut next_column = 1;

        for entry in file.datasources {
            let ds_id = DataSourceId(entry.id);
            if catalog.data_sources.iter().any(|d| d.id == ds_id) {
                return Err(CatalogError::DuplicateDataSource(ds_id));
            }
            catalog.data_sources.push(DataSource {
                id: ds_id,
                display_name: entry.display_name,
                kind: entry.kind,
                connection_str: entry.connection_str,
                enabled: entry.enabled,
                dialect_version: entry.dialect_version,
            });

            let mut table_ids: HashMap<String, TableId> = HashMap::new();
            let mut column_ids: HashMap<String, ColumnId> = HashMap::new();
            let mut foreign_keys: Vec<(String, ForeignKeyEntry)> = Vec::new();

            for table in entry.tables {
                let table_id = TableId(next_table);
                next_table += 1;

                for column in table.columns {
                    let column_id = ColumnId(next_column);
                    next_column += 1;
                    column_ids.insert(format!("{}.{}", table.name, column.name), column_id);
                    catalog.columns.push(TableColumn {
                        id: column_id,
                        table: table_id,
                        name: column.name,
                        pub_name: column.pub_name,
                        data_type: column.data_type,
                    });
                }

                for filter in table.row_filters {
                    catalog.base_filters.push(TableRowFilter {
                        data_source: ds_id,
                        table: table_id,
                        filter,
                    });
                }

                foreign_keys.extend(
                    table
                        .foreign_keys
                        .into_iter()
                        .map(|fk| (table.name.clone(), fk)),
                );
                table_ids.insert(table.name.clone(), table_id);
                catalog.tables.push(Table {
                    id: table_id,
                    data_source: ds_id,
                    name: table.name,
                    pub_name: table.pub_name,
                });
            }

            let lookup_table = |name: &str| {
                table_ids
                    .get(name)
                    .copied()
                    .ok_or_else(|| CatalogError::UnknownTable {
                        data_source: ds_id,
                        table: name.to_string(),
                    })
            };
            let lookup_column = |name: &str| {
                column_ids
                    .get(name)
                    .copied()
                    .ok_or_else(|| CatalogError::UnknownColumn {
                        data_source: ds_id,
                        column: name.to_string(),
                    })
            };

            // Resolved once every table is known, so references may point forward.
            for (table, fk) in foreign_keys {
                if fk.columns.len() != fk.references.columns.len() || fk.columns.is_empty() {
                    return Err(CatalogError::ForeignKeyArity {
                        data_source: ds_id,
                        table,
                        columns: fk.columns.len(),
                        references: fk.references.columns.len(),
                    });
                }
                let qualify = |table: &str, columns: &[String]| -> Vec<String> {
                    columns.iter().map(|c| format!("{}.{}", table, c)).collect()
                };
                catalog.foreign_keys.push(ForeignKey {
                    table: lookup_table(&table)?,
                    columns: resolve_all(&qualify(&table, &fk.columns), lookup_column)?,
                    references_table: lookup_table(&fk.references.table)?,
                    references_columns: resolve_all(
                        &qualify(&fk.references.table, &fk.references.columns),
                        lookup_column,
                    )?,
                });
            }

            if !entry.private_tables.is_empty() {
                catalog.private_tables.push(PrivateTableSelector {
                    data_source: ds_id,
                    tables: resolve_all(&entry.private_tables, lookup_table)?,
                });
            }
            if !entry.private_columns.is_empty() {
                catalog.private_columns.push(PrivateColumnSelector {
                    data_source: ds_id,
                    columns: resolve_all(&entry.private_columns, lookup_column)?,
                });
            }

            for (role, selectors) in entry.roles {
                if !selectors.include_tables.is_empty() || !selectors.exclude_tables.is_empty() {
                    catalog.role_tables.push(RoleTableSelector {
                        role: role.clone(),
                        include: resolve_all(&selectors.include_tables, lookup_table)?,
                        exclude: resolve_all(&selectors.exclude_tables, lookup_table)?,
                    });
                }
                if !selectors.include_columns.is_empty() || !selectors.exclude_columns.is_empty() {
                    catalog.role_columns.push(RoleColumnSelector {
                        role: role.clone(),
                        include: resolve_all(&selectors.include_columns, lookup_column)?,
                        exclude: resolve_all(&selectors.exclude_columns, lookup_column)?,
                    });
                }
                for (table, filters) in selectors.row_filters {
                    let table_id = lookup_table(&table)?;
                    for filter in filters {
                        catalog.role_filters.push(RoleRowFilter {
                            data_source: ds_id,
                            role: role.clone(),
                            table: table_id,
                            filter,
                        });
                    }
                }
            }
        }

        tracing::debug!(
            data_sources = catalog.data_sources.len(),
            tables = catalog.tables.len(),
            columns = catalog.columns.len(),
            "Catalog resolved"
        );

        Ok(catalog)
    }
}

fn resolve_all<T>(
    names: &[String],
    lookup: impl Fn(&str) -> Result<T, CatalogError>,
) -> Result<Vec<T>, CatalogError> {
    names.iter().map(|n| lookup(n)).collect()
}

fn default_true() -> bool {
    true
}
