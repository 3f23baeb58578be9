//! Catalog data model.
//!
//! A [`DataSource`] owns [`Table`]s, a table owns [`TableColumn`]s. Every
//! table and column has an internal (physical) name and an optional public
//! alias; the alias is what callers, prompts and the rewriter see.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a data source.
    DataSourceId
);
id_type!(
    /// Identifier of a table record.
    TableId
);
id_type!(
    /// Identifier of a column record.
    ColumnId
);

/// Declared database kind of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbKind {
    #[default]
    Generic,
    Postgres,
    Mysql,
    Sqlite,
    Oracle,
}

impl DbKind {
    /// Dialect name used in prompts.
    pub fn dialect_name(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Oracle => "oracle",
        }
    }
}

impl fmt::Display for DbKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dialect_name())
    }
}

/// A physical database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: DataSourceId,
    pub display_name: String,
    #[serde(default)]
    pub kind: DbKind,
    pub connection_str: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Server version, if known (rendered into prompts).
    #[serde(default)]
    pub dialect_version: Option<String>,
}

impl DataSource {
    pub fn dialect_name(&self) -> &'static str {
        self.kind.dialect_name()
    }

    pub fn dialect_version(&self) -> &str {
        self.dialect_version.as_deref().unwrap_or("")
    }
}

/// A table of a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub data_source: DataSourceId,
    pub name: String,
    #[serde(default)]
    pub pub_name: Option<String>,
}

impl Table {
    /// The name exposed in the virtual schema. Never empty for a named table.
    pub fn public_name(&self) -> &str {
        public_or_internal(self.pub_name.as_deref(), &self.name)
    }
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub id: ColumnId,
    pub table: TableId,
    pub name: String,
    #[serde(default)]
    pub pub_name: Option<String>,
    /// Declared data type; empty means unspecified.
    #[serde(default)]
    pub data_type: String,
}

impl TableColumn {
    pub fn public_name(&self) -> &str {
        public_or_internal(self.pub_name.as_deref(), &self.name)
    }
}

/// A declared reference from columns of one table to columns of another,
/// both of the same data source. `columns[i]` references
/// `references_columns[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: TableId,
    pub columns: Vec<ColumnId>,
    pub references_table: TableId,
    pub references_columns: Vec<ColumnId>,
}

fn public_or_internal<'a>(alias: Option<&'a str>, name: &'a str) -> &'a str {
    match alias.map(str::trim) {
        Some(alias) if !alias.is_empty() => alias,
        _ => name,
    }
}

/// Global table deny-list of a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateTableSelector {
    pub data_source: DataSourceId,
    pub tables: Vec<TableId>,
}

/// Tables explicitly granted to and revoked from a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTableSelector {
    pub role: String,
    #[serde(default)]
    pub include: Vec<TableId>,
    #[serde(default)]
    pub exclude: Vec<TableId>,
}

/// Global column deny-list of a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateColumnSelector {
    pub data_source: DataSourceId,
    pub columns: Vec<ColumnId>,
}

/// Columns explicitly granted to and revoked from a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleColumnSelector {
    pub role: String,
    #[serde(default)]
    pub include: Vec<ColumnId>,
    #[serde(default)]
    pub exclude: Vec<ColumnId>,
}

/// Row filter applied to a table for every role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRowFilter {
    pub data_source: DataSourceId,
    pub table: TableId,
    pub filter: String,
}

/// Row filter applied to a table for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRowFilter {
    pub data_source: DataSourceId,
    pub role: String,
    pub table: TableId,
    pub filter: String,
}

/// A caller identity and the roles it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The set of roles a caller holds.
///
/// Ordered so that it can key caches and produce stable log output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", roles.join(", "))
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pub_name: Option<&str>) -> Table {
        Table {
            id: TableId(1),
            data_source: DataSourceId(1),
            name: "Album".to_string(),
            pub_name: pub_name.map(str::to_string),
        }
    }

    #[test]
    fn test_public_name_prefers_alias() {
        assert_eq!(table(Some("Albums")).public_name(), "Albums");
    }

    #[test]
    fn test_public_name_falls_back_to_internal() {
        assert_eq!(table(None).public_name(), "Album");
        assert_eq!(table(Some("")).public_name(), "Album");
        assert_eq!(table(Some("   ")).public_name(), "Album");
    }

    #[test]
    fn test_column_public_name() {
        let column = TableColumn {
            id: ColumnId(7),
            table: TableId(1),
            name: "cust_email".to_string(),
            pub_name: Some("Email".to_string()),
            data_type: String::new(),
        };
        assert_eq!(column.public_name(), "Email");
    }

    #[test]
    fn test_role_set_is_ordered_and_deduplicated() {
        let roles: RoleSet = ["sales", "admin", "sales"].into_iter().collect();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles.iter().collect::<Vec<_>>(), vec!["admin", "sales"]);
        assert_eq!(roles.to_string(), "[admin, sales]");
    }

    #[test]
    fn test_data_source_deserializes_with_defaults() {
        let ds: DataSource = serde_yaml::from_str(
            "id: 3\ndisplay_name: chinook\nconnection_str: sqlite://chinook.db\n",
        )
        .unwrap();
        assert!(ds.enabled);
        assert_eq!(ds.kind, DbKind::Generic);
        assert_eq!(ds.dialect_version(), "");
    }
}
