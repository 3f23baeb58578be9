//! `CREATE TABLE` rendering for prompts.

use std::fmt::Write;

use super::VirtualSchema;
use crate::parser::is_plain_word;

impl VirtualSchema {
    /// Render the schema as DDL using public names only.
    ///
    /// Filters and physical names are never rendered. Foreign keys follow
    /// the columns so the model can see how tables join.
    pub fn to_ddl(&self) -> String {
        let mut out = String::new();
        for (i, table) in self.tables.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "CREATE TABLE {} (", display_ident(&table.name));

            let columns = table.columns.iter().map(|column| {
                let data_type = column.data_type.trim();
                if data_type.is_empty() {
                    format!("  {}", display_ident(&column.name))
                } else {
                    format!("  {} {}", display_ident(&column.name), data_type)
                }
            });
            let foreign_keys = table.foreign_keys.iter().map(|fk| {
                format!(
                    "  FOREIGN KEY ({}) REFERENCES {} ({})",
                    ident_list(&fk.columns),
                    display_ident(&fk.references_table),
                    ident_list(&fk.references_columns)
                )
            });
            let body: Vec<String> = columns.chain(foreign_keys).collect();

            out.push_str(&body.join(",\n"));
            out.push_str("\n);\n");
        }
        out
    }
}

fn ident_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| display_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quote an identifier only when it is not a plain word.
fn display_ident(name: &str) -> String {
    if is_plain_word(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
