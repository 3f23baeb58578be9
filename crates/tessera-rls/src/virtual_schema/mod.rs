//! Restricted, alias-renamed view of a data source.
//!
//! A [`VirtualSchema`] is the only thing the rewriter and the prompt
//! pipeline learn about a data source. It is built once per request from
//! the physical schema and an effective policy and never changes after.
//!
//! ```text
//! PhysicalSchema ─┐
//!                 ├─▶ VirtualSchema::build ─▶ VirtualSchema ─┬─▶ to_ddl()   (prompt)
//! EffectivePolicy ┘                                          └─▶ RewriteEngine
//! ```

mod builder;
mod ddl;

use serde::Serialize;
use tessera_core::DbKind;

/// Visible tables of one data source, under their public names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualSchema {
    dialect: DbKind,
    tables: Vec<VirtualTable>,
}

/// A visible table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualTable {
    name: String,
    physical_name: String,
    columns: Vec<VirtualColumn>,
    foreign_keys: Vec<VirtualForeignKey>,
    filter: Option<String>,
}

/// A reference between visible tables, under public names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualForeignKey {
    columns: Vec<String>,
    references_table: String,
    references_columns: Vec<String>,
}

/// A visible column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualColumn {
    name: String,
    physical_name: String,
    data_type: String,
}

impl VirtualSchema {
    pub fn new(dialect: DbKind, tables: Vec<VirtualTable>) -> Self {
        Self { dialect, tables }
    }

    pub fn dialect(&self) -> DbKind {
        self.dialect
    }

    pub fn tables(&self) -> &[VirtualTable] {
        &self.tables
    }

    /// Look up a table by public name, ignoring ASCII case.
    pub fn table(&self, name: &str) -> Option<&VirtualTable> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl VirtualTable {
    pub fn new(name: impl Into<String>, physical_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            physical_name: physical_name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            filter: None,
        }
    }

    pub fn with_column(
        mut self,
        name: impl Into<String>,
        physical_name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        self.columns.push(VirtualColumn {
            name: name.into(),
            physical_name: physical_name.into(),
            data_type: data_type.into(),
        });
        self
    }

    /// Declare a reference, all names public.
    pub fn with_foreign_key(
        mut self,
        columns: &[&str],
        references_table: impl Into<String>,
        references_columns: &[&str],
    ) -> Self {
        self.foreign_keys.push(VirtualForeignKey {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references_table: references_table.into(),
            references_columns: references_columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// Attach a composed `WHERE …` clause.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Public name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn physical_name(&self) -> &str {
        &self.physical_name
    }

    pub fn columns(&self) -> &[VirtualColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&VirtualColumn> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn foreign_keys(&self) -> &[VirtualForeignKey] {
        &self.foreign_keys
    }
}

impl VirtualForeignKey {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Public name of the referenced table.
    pub fn references_table(&self) -> &str {
        &self.references_table
    }

    pub fn references_columns(&self) -> &[String] {
        &self.references_columns
    }
}

impl VirtualColumn {
    /// Public name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn physical_name(&self) -> &str {
        &self.physical_name
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }
}
