//! Physical schema as reported by introspection.

use serde::{Deserialize, Serialize};
use tessera_core::{ColumnId, ForeignKey, Table, TableColumn, TableId};

/// Tables and columns that actually exist in a data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalSchema {
    tables: Vec<PhysicalTable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalTable {
    pub name: String,
    pub columns: Vec<PhysicalColumn>,
    #[serde(default)]
    pub foreign_keys: Vec<PhysicalForeignKey>,
}

/// `FOREIGN KEY (columns) REFERENCES references_table (references_columns)`,
/// all physical names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalForeignKey {
    pub columns: Vec<String>,
    pub references_table: String,
    pub references_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalColumn {
    pub name: String,
    /// Native type name; empty when the driver does not report one.
    #[serde(default)]
    pub data_type: String,
}

impl PhysicalSchema {
    pub fn new(tables: Vec<PhysicalTable>) -> Self {
        Self { tables }
    }

    /// Physical schema described by catalog records alone.
    ///
    /// Foreign keys naming a table or column outside `tables` and `columns`
    /// are skipped.
    pub fn from_catalog(
        tables: &[Table],
        columns: &[TableColumn],
        foreign_keys: &[ForeignKey],
    ) -> Self {
        let table_name = |id: TableId| {
            tables
                .iter()
                .find(|t| t.id == id)
                .map(|t| t.name.clone())
        };
        let column_names = |ids: &[ColumnId]| -> Option<Vec<String>> {
            ids.iter()
                .map(|id| columns.iter().find(|c| c.id == *id).map(|c| c.name.clone()))
                .collect()
        };

        let tables = tables
            .iter()
            .map(|table| PhysicalTable {
                name: table.name.clone(),
                columns: columns
                    .iter()
                    .filter(|c| c.table == table.id)
                    .map(|c| PhysicalColumn {
                        name: c.name.clone(),
                        data_type: c.data_type.clone(),
                    })
                    .collect(),
                foreign_keys: foreign_keys
                    .iter()
                    .filter(|fk| fk.table == table.id)
                    .filter_map(|fk| {
                        Some(PhysicalForeignKey {
                            columns: column_names(&fk.columns)?,
                            references_table: table_name(fk.references_table)?,
                            references_columns: column_names(&fk.references_columns)?,
                        })
                    })
                    .collect(),
            })
            .collect();
        Self { tables }
    }

    pub fn tables(&self) -> &[PhysicalTable] {
        &self.tables
    }

    /// Look up a table by name. An exact match wins over a case-insensitive one.
    pub fn table(&self, name: &str) -> Option<&PhysicalTable> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .or_else(|| self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl PhysicalTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.columns.push(PhysicalColumn {
            name: name.into(),
            data_type: data_type.into(),
        });
        self
    }

    pub fn with_foreign_key(
        mut self,
        columns: &[&str],
        references_table: impl Into<String>,
        references_columns: &[&str],
    ) -> Self {
        self.foreign_keys.push(PhysicalForeignKey {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references_table: references_table.into(),
            references_columns: references_columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn column(&self, name: &str) -> Option<&PhysicalColumn> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }
}
