//! Rewriting virtual-schema statements into native SQL.
//!
//! [`SubqueryRewriter`] replaces every reference to a virtual table with a
//! derived table over the physical table:
//!
//! ```sql
//! -- caller
//! SELECT Title FROM Album a WHERE a.AlbumId < 10
//! -- native
//! SELECT Title FROM (SELECT "album_id" AS "AlbumId", "title" AS "Title"
//!                    FROM "albums_tbl" WHERE (album_id < 100)) AS a
//! WHERE a.AlbumId < 10
//! ```
//!
//! Only the derived table ever touches the physical table, so hidden columns
//! are unreachable and the row filter always applies.

use sqlparser::ast::{
    Expr, ObjectName, Query, SelectItem, SetExpr, Statement, TableFactor, Visit, VisitMut, Visitor,
    VisitorMut,
};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::Mutex;

use crate::error::RewriteError;
use crate::functions::is_denied_function;
use crate::parser::{SqlAnalyzer, relation_name};
use crate::virtual_schema::{VirtualSchema, VirtualTable};

/// Maps a statement written against a [`VirtualSchema`] to native SQL.
pub trait RewriteEngine: Send + Sync {
    fn rewrite(&self, schema: &VirtualSchema, sql: &str) -> Result<String, RewriteError>;
}

/// sqlparser-based rewriter using derived-table substitution.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubqueryRewriter;

impl SubqueryRewriter {
    pub fn new() -> Self {
        Self
    }
}

impl RewriteEngine for SubqueryRewriter {
    fn rewrite(&self, schema: &VirtualSchema, sql: &str) -> Result<String, RewriteError> {
        let analyzer = SqlAnalyzer::new(schema.dialect());
        let mut statement = analyzer.parse_query(sql)?;

        let mut scope = Scope::new(schema);
        if let ControlFlow::Break(err) = Visit::visit(&statement, &mut scope) {
            return Err(err);
        }

        let mut columns = ColumnCheck { scope: &scope };
        if let ControlFlow::Break(err) = Visit::visit(&statement, &mut columns) {
            return Err(err);
        }

        let mut substitution = Substitution {
            schema,
            analyzer,
            ctes: CteScopes::default(),
            replaced: 0,
        };
        if let ControlFlow::Break(err) = VisitMut::visit(&mut statement, &mut substitution) {
            return Err(err);
        }

        tracing::debug!(
            dialect = %schema.dialect(),
            replaced = substitution.replaced,
            "Rewrote statement against virtual schema"
        );

        Ok(statement.to_string())
    }
}

/// Niladic functions some dialects parse as bare identifiers.
const NILADIC: &[&str] = &[
    "CURRENT_DATE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "CURRENT_USER",
    "SESSION_USER",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "SYSDATE",
];

/// Names in scope anywhere in the statement.
///
/// Scoping is flattened across subqueries: a binding introduced in any
/// FROM clause is visible to every qualified reference.
struct Scope<'a> {
    schema: &'a VirtualSchema,
    ctes: CteScopes,
    /// Set when any query of the statement declares a CTE.
    has_ctes: bool,
    /// Lowercased alias or table name -> bound virtual table.
    bindings: HashMap<String, &'a VirtualTable>,
    /// Lowercased projection aliases.
    aliases: HashSet<String>,
    /// Set when a FROM item has columns the schema does not describe.
    opaque: bool,
}

impl<'a> Scope<'a> {
    fn new(schema: &'a VirtualSchema) -> Self {
        Self {
            schema,
            ctes: CteScopes::default(),
            has_ctes: false,
            bindings: HashMap::new(),
            aliases: HashSet::new(),
            opaque: false,
        }
    }

    /// Whether unqualified identifiers can be checked against known columns.
    fn checks_unqualified(&self) -> bool {
        !self.opaque && !self.has_ctes
    }

    fn is_known_unqualified(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.aliases.contains(&lower)
            || self.bindings.values().any(|table| table.column(name).is_some())
    }
}

impl Visitor for Scope<'_> {
    type Break = RewriteError;

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        self.has_ctes |= query.with.is_some();
        self.ctes.enter(query);
        collect_aliases(&query.body, &mut self.aliases);
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        self.ctes.leave(query);
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, factor: &TableFactor) -> ControlFlow<Self::Break> {
        match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                if self.ctes.resolves(name) {
                    return ControlFlow::Continue(());
                }
                let table_name = relation_name(name);
                let table = match (args, self.schema.table(&table_name)) {
                    (None, Some(table)) => table,
                    _ => {
                        return ControlFlow::Break(RewriteError::UnknownTable {
                            identifier: name.to_string(),
                        });
                    }
                };
                let key = alias
                    .as_ref()
                    .map(|a| a.name.value.clone())
                    .unwrap_or(table_name);
                self.bindings.insert(key.to_ascii_lowercase(), table);
            }
            TableFactor::NestedJoin { .. } => {}
            TableFactor::Function { name, .. } if is_denied_function(self.schema.dialect(), name) => {
                return ControlFlow::Break(RewriteError::ForbiddenFunction {
                    identifier: name.to_string(),
                });
            }
            _ => self.opaque = true,
        }
        ControlFlow::Continue(())
    }
}

fn collect_aliases(body: &SetExpr, out: &mut HashSet<String>) {
    match body {
        SetExpr::Select(select) => {
            for item in &select.projection {
                if let SelectItem::ExprWithAlias { alias, .. } = item {
                    out.insert(alias.value.to_ascii_lowercase());
                }
            }
        }
        SetExpr::SetOperation { left, right, .. } => {
            collect_aliases(left, out);
            collect_aliases(right, out);
        }
        SetExpr::Query(query) => collect_aliases(&query.body, out),
        _ => {}
    }
}

/// CTE names in scope at the current point of a walk, one frame per query.
///
/// A non-recursive CTE is visible to the CTEs declared after it and to the
/// body of its query; a recursive `WITH` makes every name visible
/// throughout. Frames close with their query, so a CTE declared inside a
/// subquery never covers a sibling FROM item.
#[derive(Default)]
struct CteScopes {
    frames: Vec<CteFrame>,
}

struct CteFrame {
    visible: HashSet<String>,
    /// CTE bodies not yet walked, identified by address, with their names.
    pending: Vec<(*const Query, String)>,
}

impl CteScopes {
    fn enter(&mut self, query: &Query) {
        let mut frame = CteFrame {
            visible: HashSet::new(),
            pending: Vec::new(),
        };
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let name = cte.alias.name.value.to_ascii_lowercase();
                if with.recursive {
                    frame.visible.insert(name);
                } else {
                    frame.pending.push((&*cte.query as *const Query, name));
                }
            }
        }
        self.frames.push(frame);
    }

    fn leave(&mut self, query: &Query) {
        self.frames.pop();
        // A finished CTE body makes its name visible to what follows it.
        if let Some(parent) = self.frames.last_mut() {
            if let Some(i) = parent
                .pending
                .iter()
                .position(|(body, _)| std::ptr::eq(*body, query))
            {
                let (_, name) = parent.pending.remove(i);
                parent.visible.insert(name);
            }
        }
    }

    /// Whether `name` refers to a CTE rather than a table.
    fn resolves(&self, name: &ObjectName) -> bool {
        if name.0.len() != 1 {
            return false;
        }
        let name = relation_name(name).to_ascii_lowercase();
        self.frames.iter().any(|frame| frame.visible.contains(&name))
    }
}

/// Rejects references to columns the bound table does not expose, and
/// calls to denied functions.
struct ColumnCheck<'s, 'a> {
    scope: &'s Scope<'a>,
}

impl Visitor for ColumnCheck<'_, '_> {
    type Break = RewriteError;

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        match expr {
            Expr::Function(function)
                if is_denied_function(self.scope.schema.dialect(), &function.name) =>
            {
                return ControlFlow::Break(RewriteError::ForbiddenFunction {
                    identifier: function.name.to_string(),
                });
            }
            Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
                let qualifier = &parts[parts.len() - 2];
                let column = &parts[parts.len() - 1];
                let bound = self
                    .scope
                    .bindings
                    .get(&qualifier.value.to_ascii_lowercase());
                if let Some(table) = bound {
                    if table.column(&column.value).is_none() {
                        return ControlFlow::Break(RewriteError::UnknownColumn {
                            identifier: format!("{}.{}", qualifier.value, column.value),
                        });
                    }
                }
            }
            Expr::Identifier(ident) if self.scope.checks_unqualified() => {
                let niladic = ident.quote_style.is_none()
                    && NILADIC.contains(&ident.value.to_ascii_uppercase().as_str());
                if !niladic && !self.scope.is_known_unqualified(&ident.value) {
                    return ControlFlow::Break(RewriteError::UnknownColumn {
                        identifier: ident.value.clone(),
                    });
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

/// Swaps virtual table references for derived tables.
struct Substitution<'a> {
    schema: &'a VirtualSchema,
    analyzer: SqlAnalyzer,
    ctes: CteScopes,
    replaced: usize,
}

impl Substitution<'_> {
    /// `(SELECT phys AS pub, … FROM phys_table [filter]) AS alias`
    fn derived_table(&self, table: &VirtualTable, alias: &str) -> Result<TableFactor, RewriteError> {
        let projection = table
            .columns()
            .iter()
            .map(|c| {
                format!(
                    "{} AS {}",
                    self.analyzer.quote(c.physical_name()),
                    self.analyzer.alias_ident(c.name())
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut inner = format!(
            "SELECT {} FROM {}",
            projection,
            self.analyzer.quote_path(table.physical_name())
        );
        if let Some(filter) = table.filter() {
            inner.push(' ');
            inner.push_str(filter);
        }

        let wrapper = format!("SELECT * FROM ({}) AS {}", inner, alias);
        let mut statements = self.analyzer.parse(&wrapper)?;
        let relation = match statements.pop() {
            Some(Statement::Query(query)) => query
                .body
                .as_select()
                .and_then(|select| select.from.first())
                .map(|from| from.relation.clone()),
            _ => None,
        };
        relation.ok_or_else(|| {
            RewriteError::Parse(format!("cannot build derived table for {}", table.name()))
        })
    }
}

impl VisitorMut for Substitution<'_> {
    type Break = RewriteError;

    fn pre_visit_query(&mut self, query: &mut Query) -> ControlFlow<Self::Break> {
        self.ctes.enter(query);
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, query: &mut Query) -> ControlFlow<Self::Break> {
        self.ctes.leave(query);
        ControlFlow::Continue(())
    }

    fn post_visit_table_factor(&mut self, factor: &mut TableFactor) -> ControlFlow<Self::Break> {
        let TableFactor::Table {
            name,
            alias,
            args: None,
            ..
        } = factor
        else {
            return ControlFlow::Continue(());
        };

        if self.ctes.resolves(name) {
            return ControlFlow::Continue(());
        }
        let table_name = relation_name(name);
        let Some(table) = self.schema.table(&table_name) else {
            return ControlFlow::Break(RewriteError::UnknownTable {
                identifier: name.to_string(),
            });
        };

        // Keep the caller's alias; otherwise the table name as written.
        let alias = match alias {
            Some(alias) if alias.columns.is_empty() => alias.name.to_string(),
            Some(alias) => {
                let columns: Vec<String> = alias.columns.iter().map(ToString::to_string).collect();
                format!("{} ({})", alias.name, columns.join(", "))
            }
            None => {
                let written = name.to_string();
                written.rsplit('.').next().unwrap_or(&written).to_string()
            }
        };

        match self.derived_table(table, &alias) {
            Ok(derived) => {
                *factor = derived;
                self.replaced += 1;
                ControlFlow::Continue(())
            }
            Err(err) => ControlFlow::Break(err),
        }
    }
}

/// Rewriter returning a canned outcome and recording the schemas it saw.
#[derive(Debug)]
pub struct FakeRewriter {
    outcome: Result<String, RewriteError>,
    seen: Mutex<Vec<Vec<String>>>,
}

impl FakeRewriter {
    pub fn returning(sql: impl Into<String>) -> Self {
        Self {
            outcome: Ok(sql.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: RewriteError) -> Self {
        Self {
            outcome: Err(error),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Table names of every schema passed to `rewrite`, in call order.
    pub fn seen_tables(&self) -> Vec<Vec<String>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl RewriteEngine for FakeRewriter {
    fn rewrite(&self, schema: &VirtualSchema, _sql: &str) -> Result<String, RewriteError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(schema.table_names().into_iter().map(str::to_string).collect());
        }
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tessera_core::DbKind;

    fn schema(kind: DbKind) -> VirtualSchema {
        VirtualSchema::new(
            kind,
            vec![
                VirtualTable::new("Album", "Album")
                    .with_column("AlbumId", "AlbumId", "INTEGER")
                    .with_column("Title", "Title", "NVARCHAR(160)"),
                VirtualTable::new("Invoice", "Invoice")
                    .with_column("InvoiceId", "InvoiceId", "INTEGER")
                    .with_column("Total", "Total", "NUMERIC")
                    .with_filter("WHERE (Total > 0) AND ( (BillingCountry = 'USA') )"),
                VirtualTable::new("Client", "customers")
                    .with_column("ClientId", "cust_id", "INTEGER")
                    .with_column("Email", "email_addr", "TEXT"),
            ],
        )
    }

    fn album_only() -> VirtualSchema {
        VirtualSchema::new(
            DbKind::Sqlite,
            vec![VirtualTable::new("Album", "Album").with_column("AlbumId", "AlbumId", "INTEGER")],
        )
    }

    fn rewrite(kind: DbKind, sql: &str) -> Result<String, RewriteError> {
        SubqueryRewriter::new().rewrite(&schema(kind), sql)
    }

    #[test]
    fn test_unknown_table_rejected() {
        let err = SubqueryRewriter::new()
            .rewrite(&album_only(), "SELECT * FROM InvalidTable")
            .unwrap_err();

        assert_eq!(
            err,
            RewriteError::UnknownTable {
                identifier: "InvalidTable".to_string()
            }
        );
        assert_eq!(err.to_string(), "No such table found.");
        assert_eq!(err.identifier(), Some("InvalidTable"));
    }

    #[test]
    fn test_unknown_table_in_subquery_rejected() {
        let err = SubqueryRewriter::new()
            .rewrite(
                &album_only(),
                "SELECT AlbumId FROM Album WHERE AlbumId IN (SELECT AlbumId FROM Track)",
            )
            .unwrap_err();
        assert_eq!(err.identifier(), Some("Track"));
    }

    #[test]
    fn test_album_becomes_derived_table() {
        let native = rewrite(DbKind::Sqlite, "SELECT Title FROM Album").unwrap();
        assert_eq!(
            native,
            "SELECT Title FROM (SELECT \"AlbumId\" AS \"AlbumId\", \"Title\" AS \"Title\" \
             FROM \"Album\") AS Album"
        );
    }

    #[test]
    fn test_physical_names_only_inside_derived_table() {
        let native = rewrite(DbKind::Sqlite, "SELECT c.Email FROM Client AS c").unwrap();

        assert!(native.contains("\"cust_id\" AS \"ClientId\""));
        assert!(native.contains("\"email_addr\" AS \"Email\""));
        assert!(native.contains("FROM \"customers\") AS c"));
        assert!(native.starts_with("SELECT c.Email FROM ("));
    }

    #[test]
    fn test_filter_applied_inside_subquery() {
        let native = rewrite(
            DbKind::Sqlite,
            "SELECT SUM(Total) FROM Invoice WHERE Total > 10",
        )
        .unwrap();

        assert!(native.contains("FROM \"Invoice\" WHERE (Total > 0) AND ((BillingCountry = 'USA'))"));
        assert!(native.ends_with("AS Invoice WHERE Total > 10"));
    }

    #[test]
    fn test_join_rewrites_both_sides() {
        let native = rewrite(
            DbKind::Sqlite,
            "SELECT a.Title, i.Total FROM Album a JOIN Invoice i ON a.AlbumId = i.InvoiceId",
        )
        .unwrap();

        assert!(native.contains("FROM \"Album\") AS a JOIN (SELECT"));
        assert!(native.contains(") AS i ON a.AlbumId = i.InvoiceId"));
    }

    #[test]
    fn test_cte_reference_untouched() {
        let native = rewrite(
            DbKind::Sqlite,
            "WITH best AS (SELECT AlbumId FROM Album) SELECT * FROM best",
        )
        .unwrap();

        assert!(native.contains("FROM \"Album\") AS Album"));
        assert!(native.ends_with("SELECT * FROM best"));
    }

    #[test]
    fn test_nested_cte_does_not_cover_sibling_table() {
        let err = rewrite(
            DbKind::Sqlite,
            "SELECT * FROM (WITH Customer AS (SELECT 1 AS x) SELECT x FROM Customer) t \
             CROSS JOIN Customer",
        )
        .unwrap_err();
        assert_eq!(err.identifier(), Some("Customer"));
    }

    #[test]
    fn test_nested_cte_named_like_table_keeps_filter_outside() {
        let native = rewrite(
            DbKind::Sqlite,
            "SELECT * FROM (WITH Invoice AS (SELECT 1 AS x) SELECT x FROM Invoice) t \
             CROSS JOIN Invoice",
        )
        .unwrap();

        assert!(native.contains("SELECT x FROM Invoice)"));
        assert!(native.ends_with(
            "FROM \"Invoice\" WHERE (Total > 0) AND ((BillingCountry = 'USA'))) AS Invoice"
        ));
    }

    #[test]
    fn test_cte_body_referencing_own_name_reads_table() {
        let native = rewrite(
            DbKind::Sqlite,
            "WITH Invoice AS (SELECT InvoiceId FROM Invoice) SELECT * FROM Invoice",
        )
        .unwrap();

        assert!(native.contains("FROM \"Invoice\" WHERE (Total > 0)"));
        assert!(native.ends_with("SELECT * FROM Invoice"));
    }

    #[test]
    fn test_qualified_name_is_never_a_cte() {
        let native = rewrite(
            DbKind::Sqlite,
            "WITH Album AS (SELECT 1 AS x) SELECT * FROM main.Album",
        )
        .unwrap();
        assert!(native.ends_with("FROM \"Album\") AS Album"));
    }

    #[test]
    fn test_query_string_functions_rejected() {
        let err = rewrite(
            DbKind::Postgres,
            "SELECT query_to_xml('SELECT * FROM customers', true, true, '') FROM Invoice",
        )
        .unwrap_err();
        assert_eq!(
            err,
            RewriteError::ForbiddenFunction {
                identifier: "query_to_xml".to_string()
            }
        );

        let err = rewrite(
            DbKind::Postgres,
            "SELECT Title FROM Album WHERE Title IN (SELECT pg_read_file('/etc/passwd'))",
        )
        .unwrap_err();
        assert_eq!(err.identifier(), Some("pg_read_file"));

        assert!(matches!(
            rewrite(DbKind::Sqlite, "SELECT load_extension('evil.so')"),
            Err(RewriteError::ForbiddenFunction { .. })
        ));
        assert!(rewrite(DbKind::Postgres, "SELECT upper(Title) FROM Album").is_ok());
    }

    #[test]
    fn test_hidden_qualified_column_rejected() {
        let err = rewrite(DbKind::Sqlite, "SELECT a.Secret FROM Album a").unwrap_err();
        assert_eq!(
            err,
            RewriteError::UnknownColumn {
                identifier: "a.Secret".to_string()
            }
        );
    }

    #[test]
    fn test_hidden_unqualified_column_rejected() {
        let err = rewrite(DbKind::Sqlite, "SELECT BillingCountry FROM Invoice").unwrap_err();
        assert_eq!(err.identifier(), Some("BillingCountry"));
    }

    #[test]
    fn test_projection_alias_and_niladic_accepted() {
        assert!(rewrite(
            DbKind::Sqlite,
            "SELECT COUNT(*) AS n FROM Album GROUP BY Title ORDER BY n DESC"
        )
        .is_ok());
        assert!(rewrite(DbKind::Postgres, "SELECT CURRENT_DATE, Title FROM Album").is_ok());
    }

    #[test]
    fn test_write_statements_rejected() {
        assert!(matches!(
            rewrite(DbKind::Sqlite, "DROP TABLE Album"),
            Err(RewriteError::NotReadOnly { .. })
        ));
        assert!(matches!(
            rewrite(DbKind::Sqlite, "UPDATE Album SET Title = 'x'"),
            Err(RewriteError::NotReadOnly { .. })
        ));
    }

    #[test]
    fn test_mysql_quoting() {
        let native = rewrite(DbKind::Mysql, "SELECT Title FROM Album").unwrap();
        assert!(native.contains("`Title` AS `Title`"));
        assert!(native.contains("FROM `Album`)"));
    }

    #[test]
    fn test_postgres_output_aliases_fold() {
        let native = rewrite(DbKind::Postgres, "SELECT title FROM album").unwrap();
        assert!(native.contains("\"Title\" AS Title"));
        assert!(native.contains("FROM \"Album\") AS album"));
    }

    #[test]
    fn test_output_reparses() {
        let native = rewrite(
            DbKind::Sqlite,
            "SELECT a.Title FROM Album a WHERE a.AlbumId IN (SELECT InvoiceId FROM Invoice)",
        )
        .unwrap();
        let analyzer = SqlAnalyzer::new(DbKind::Sqlite);
        assert!(analyzer.parse_query(&native).is_ok());
    }

    #[test]
    fn test_fake_rewriter_records_schema() {
        let fake = FakeRewriter::returning("SELECT 1");
        assert_eq!(fake.rewrite(&album_only(), "anything").unwrap(), "SELECT 1");
        assert_eq!(fake.seen_tables(), vec![vec!["Album".to_string()]]);

        let failing = FakeRewriter::failing(RewriteError::Empty);
        assert_eq!(failing.rewrite(&album_only(), ""), Err(RewriteError::Empty));
    }
}
