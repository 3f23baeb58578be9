//! Functions a rewritten statement may not call.
//!
//! These functions run a query given as a string, read server files or open
//! connections elsewhere. Any of them would reach physical tables without
//! passing through the derived-table substitution.

use sqlparser::ast::ObjectName;
use tessera_core::DbKind;

const POSTGRES: &[&str] = &[
    "query_to_xml",
    "query_to_xmlschema",
    "query_to_xml_and_xmlschema",
    "cursor_to_xml",
    "cursor_to_xmlschema",
    "table_to_xml",
    "table_to_xmlschema",
    "table_to_xml_and_xmlschema",
    "schema_to_xml",
    "schema_to_xmlschema",
    "schema_to_xml_and_xmlschema",
    "database_to_xml",
    "database_to_xmlschema",
    "database_to_xml_and_xmlschema",
    "ts_stat",
    "dblink",
    "dblink_exec",
    "dblink_open",
    "dblink_fetch",
    "dblink_connect",
    "dblink_connect_u",
    "dblink_send_query",
    "dblink_get_result",
    "pg_read_file",
    "pg_read_binary_file",
    "pg_ls_dir",
    "pg_stat_file",
    "lo_import",
    "lo_export",
    "lo_get",
    "lo_open",
    "lo_put",
    "lo_from_bytea",
    "set_config",
    "pg_reload_conf",
    "pg_cancel_backend",
    "pg_terminate_backend",
];

const MYSQL: &[&str] = &["load_file", "sys_exec", "sys_eval"];

const SQLITE: &[&str] = &[
    "load_extension",
    "readfile",
    "writefile",
    "edit",
    "fts3_tokenizer",
];

const ORACLE: &[&str] = &["httpuritype", "xmltype"];

/// Oracle packages that execute dynamic SQL or reach the network or disk.
const ORACLE_PACKAGES: &[&str] = &["dbms_", "utl_"];

/// Whether `name` is a function statements against `kind` may not call.
pub fn is_denied_function(kind: DbKind, name: &ObjectName) -> bool {
    let parts = name_parts(name);
    let Some(function) = parts.last() else {
        return false;
    };

    let listed = |list: &[&str]| list.contains(&function.as_str());
    let oracle_package = || {
        parts.len() > 1
            && ORACLE_PACKAGES
                .iter()
                .any(|prefix| parts[parts.len() - 2].starts_with(prefix))
    };

    match kind {
        DbKind::Postgres => listed(POSTGRES),
        DbKind::Mysql => listed(MYSQL),
        DbKind::Sqlite => listed(SQLITE),
        DbKind::Oracle => listed(ORACLE) || oracle_package(),
        DbKind::Generic => {
            listed(POSTGRES)
                || listed(MYSQL)
                || listed(SQLITE)
                || listed(ORACLE)
                || oracle_package()
        }
    }
}

/// Lowercased, unquoted name segments.
fn name_parts(name: &ObjectName) -> Vec<String> {
    name.to_string()
        .split('.')
        .map(|part| {
            part.trim()
                .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
                .to_ascii_lowercase()
        })
        .collect()
}
