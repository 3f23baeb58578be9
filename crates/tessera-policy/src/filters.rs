//! Row-filter composition.
//!
//! Base filters apply to every role; role filters apply to the roles that
//! declare them. For one table the result is
//!
//! ```text
//! WHERE (base1) AND (base2) AND ( (role1) OR (role2) )
//! ```
//!
//! Base filters come first in declaration order, the OR'ed role clause is
//! always last. Blank predicates contribute nothing.

use std::collections::BTreeMap;
use tessera_core::{RoleRowFilter, TableId, TableRowFilter};

/// Compose the filter clause for one table, or `None` if nothing applies.
pub fn compose_filter<'a>(
    base: impl IntoIterator<Item = &'a str>,
    role: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let mut clauses: Vec<String> = parenthesize(base);

    let role_clauses = parenthesize(role);
    if !role_clauses.is_empty() {
        clauses.push(format!("( {} )", role_clauses.join(" OR ")));
    }

    if clauses.is_empty() {
        None
    } else {
        Some(format!("WHERE {}", clauses.join(" AND ")))
    }
}

fn parenthesize<'a>(filters: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    filters
        .into_iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| format!("({})", f))
        .collect()
}

/// Compose filters for every table that has at least one non-blank filter.
pub fn compose_table_filters(
    base: &[TableRowFilter],
    role: &[RoleRowFilter],
) -> BTreeMap<TableId, String> {
    let mut tables: Vec<TableId> = Vec::new();
    for id in base.iter().map(|f| f.table).chain(role.iter().map(|f| f.table)) {
        if !tables.contains(&id) {
            tables.push(id);
        }
    }

    tables
        .into_iter()
        .filter_map(|table| {
            let clause = compose_filter(
                base.iter()
                    .filter(|f| f.table == table)
                    .map(|f| f.filter.as_str()),
                role.iter()
                    .filter(|f| f.table == table)
                    .map(|f| f.filter.as_str()),
            )?;
            Some((table, clause))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tessera_core::DataSourceId;

    const NONE: [&str; 0] = [];

    #[test]
    fn test_base_and_role_filters() {
        let clause = compose_filter(["x=1", "y=2"], ["a=1", "a=2"]);
        assert_eq!(
            clause.as_deref(),
            Some("WHERE (x=1) AND (y=2) AND ( (a=1) OR (a=2) )")
        );
    }

    #[test]
    fn test_base_only() {
        assert_eq!(
            compose_filter(["Total > 0"], NONE).as_deref(),
            Some("WHERE (Total > 0)")
        );
    }

    #[test]
    fn test_role_only() {
        assert_eq!(
            compose_filter(NONE, ["Country = 'USA'"]).as_deref(),
            Some("WHERE ( (Country = 'USA') )")
        );
    }

    #[test]
    fn test_blank_filters_contribute_nothing() {
        assert_eq!(compose_filter(["", "  "], [" "]), None);
        assert_eq!(
            compose_filter(["", "x=1"], [""]).as_deref(),
            Some("WHERE (x=1)")
        );
    }

    #[test]
    fn test_compose_table_filters_groups_by_table() {
        let ds = DataSourceId(1);
        let base = vec![
            TableRowFilter { data_source: ds, table: TableId(2), filter: "b=1".into() },
            TableRowFilter { data_source: ds, table: TableId(1), filter: "a=1".into() },
            TableRowFilter { data_source: ds, table: TableId(3), filter: " ".into() },
        ];
        let role = vec![
            RoleRowFilter { data_source: ds, role: "r".into(), table: TableId(1), filter: "r=1".into() },
            RoleRowFilter { data_source: ds, role: "s".into(), table: TableId(1), filter: "r=2".into() },
        ];

        let filters = compose_table_filters(&base, &role);

        assert_eq!(filters.len(), 2);
        assert_eq!(filters[&TableId(1)], "WHERE (a=1) AND ( (r=1) OR (r=2) )");
        assert_eq!(filters[&TableId(2)], "WHERE (b=1)");
        assert!(!filters.contains_key(&TableId(3)));
    }
}
