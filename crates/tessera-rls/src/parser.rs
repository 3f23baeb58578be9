//! Dialect-aware parsing and statement classification.

use sqlparser::ast::{ObjectName, Statement};
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use std::fmt;
use tessera_core::DbKind;

use crate::error::RewriteError;

/// Parses SQL in the dialect of one data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlAnalyzer {
    kind: DbKind,
}

impl SqlAnalyzer {
    pub fn new(kind: DbKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> DbKind {
        self.kind
    }

    fn dialect(&self) -> Box<dyn Dialect> {
        match self.kind {
            DbKind::Postgres => Box::new(PostgreSqlDialect {}),
            DbKind::Mysql => Box::new(MySqlDialect {}),
            DbKind::Sqlite => Box::new(SQLiteDialect {}),
            DbKind::Generic | DbKind::Oracle => Box::new(GenericDialect {}),
        }
    }

    /// Parse `sql` with this analyzer's dialect.
    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>, RewriteError> {
        let dialect = self.dialect();
        Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| RewriteError::Parse(e.to_string()))
    }

    /// Parse exactly one read-only query.
    pub fn parse_query(&self, sql: &str) -> Result<Statement, RewriteError> {
        if sql.trim().trim_matches(';').trim().is_empty() {
            return Err(RewriteError::Empty);
        }

        let mut statements = self.parse(sql)?;
        match statements.len() {
            0 => return Err(RewriteError::Empty),
            1 => {}
            count => return Err(RewriteError::MultipleStatements { count }),
        }

        let statement = statements.remove(0);
        match self.get_operation(&statement) {
            SqlOperation::Select => Ok(statement),
            operation => Err(RewriteError::NotReadOnly {
                operation: operation.to_string(),
            }),
        }
    }

    /// Whether `stmt` changes schema objects.
    pub fn is_ddl(&self, stmt: &Statement) -> bool {
        matches!(
            stmt,
            Statement::CreateTable { .. }
                | Statement::AlterTable { .. }
                | Statement::Drop { .. }
                | Statement::Truncate { .. }
                | Statement::CreateIndex { .. }
                | Statement::CreateView { .. }
        )
    }

    /// Coarse classification of `stmt`.
    pub fn get_operation(&self, stmt: &Statement) -> SqlOperation {
        if self.is_ddl(stmt) {
            return SqlOperation::Ddl;
        }
        match stmt {
            Statement::Query(query) if query.locks.is_empty() => SqlOperation::Select,
            Statement::Query(_) => SqlOperation::Locking,
            Statement::Insert { .. } => SqlOperation::Insert,
            Statement::Update { .. } => SqlOperation::Update,
            Statement::Delete(_) => SqlOperation::Delete,
            _ => SqlOperation::Other,
        }
    }

    /// Quote an identifier for this dialect.
    pub fn quote(&self, ident: &str) -> String {
        match self.kind {
            DbKind::Mysql => format!("`{}`", ident.replace('`', "``")),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Render a public name as an output column alias.
    ///
    /// Case-folding dialects get plain words unquoted, so unquoted
    /// references in the caller's statement fold to the same name.
    pub fn alias_ident(&self, name: &str) -> String {
        match self.kind {
            DbKind::Postgres | DbKind::Oracle | DbKind::Generic if is_plain_word(name) => {
                name.to_string()
            }
            _ => self.quote(name),
        }
    }

    /// Quote a possibly dotted physical name segment by segment.
    pub fn quote_path(&self, name: &str) -> String {
        name.split('.')
            .map(|segment| self.quote(segment))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// The unqualified table name of a relation.
///
/// `public."Album"` and `Album` both yield `Album`.
pub fn relation_name(name: &ObjectName) -> String {
    let rendered = name.to_string();
    let last = rendered.rsplit('.').next().unwrap_or(&rendered);
    strip_quotes(last).to_string()
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_plain_word(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for (open, close) in [('"', '"'), ('`', '`'), ('[', ']')] {
        if s.len() >= 2 && s.starts_with(open) && s.ends_with(close) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Statement classes the read-only check distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOperation {
    Select,
    /// `SELECT … FOR UPDATE` and friends.
    Locking,
    Insert,
    Update,
    Delete,
    Ddl,
    Other,
}

impl fmt::Display for SqlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Select => "SELECT",
            Self::Locking => "SELECT with locking clause",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Ddl => "DDL",
            Self::Other => "statement",
        };
        f.write_str(name)
    }
}
