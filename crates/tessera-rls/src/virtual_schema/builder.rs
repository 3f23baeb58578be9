use tessera_core::DbKind;
use tessera_policy::EffectivePolicy;

use super::{VirtualColumn, VirtualForeignKey, VirtualSchema, VirtualTable};
use crate::physical::{PhysicalForeignKey, PhysicalSchema, PhysicalTable};

impl VirtualSchema {
    /// Restrict `physical` to what `policy` allows, renaming to public names.
    ///
    /// Tables and columns the policy allows but the database lacks are
    /// dropped, as are tables left with no visible column. The physical data
    /// type wins over the declared one when the driver reports it. Foreign
    /// keys survive only when every column on both ends is visible.
    pub fn build(dialect: DbKind, physical: &PhysicalSchema, policy: &EffectivePolicy) -> Self {
        let mut tables = Vec::with_capacity(policy.tables.len());
        let mut sources: Vec<&PhysicalTable> = Vec::with_capacity(policy.tables.len());

        for table in &policy.tables {
            let Some(physical_table) = physical.table(&table.name) else {
                tracing::debug!(table = %table.name, "Visible table missing from physical schema");
                continue;
            };

            let columns: Vec<VirtualColumn> = policy
                .columns_of(table.id)
                .filter_map(|column| {
                    let physical_column = physical_table.column(&column.name)?;
                    let data_type = if physical_column.data_type.trim().is_empty() {
                        column.data_type.clone()
                    } else {
                        physical_column.data_type.clone()
                    };
                    Some(VirtualColumn {
                        name: column.public_name().to_string(),
                        physical_name: physical_column.name.clone(),
                        data_type,
                    })
                })
                .collect();

            if columns.is_empty() {
                tracing::debug!(table = %table.name, "Visible table has no visible columns");
                continue;
            }

            tables.push(VirtualTable {
                name: table.public_name().to_string(),
                physical_name: physical_table.name.clone(),
                columns,
                foreign_keys: Vec::new(),
                filter: policy.filter_for(table.id).map(str::to_string),
            });
            sources.push(physical_table);
        }

        let foreign_keys: Vec<Vec<VirtualForeignKey>> = sources
            .iter()
            .zip(&tables)
            .map(|(source, table)| {
                source
                    .foreign_keys
                    .iter()
                    .filter_map(|fk| visible_foreign_key(fk, table, &tables))
                    .collect()
            })
            .collect();
        for (table, keys) in tables.iter_mut().zip(foreign_keys) {
            table.foreign_keys = keys;
        }

        tracing::debug!(
            data_source = %policy.data_source,
            tables = tables.len(),
            "Built virtual schema"
        );

        Self { dialect, tables }
    }
}

/// `fk` of `table` under public names, if both ends are visible.
fn visible_foreign_key(
    fk: &PhysicalForeignKey,
    table: &VirtualTable,
    tables: &[VirtualTable],
) -> Option<VirtualForeignKey> {
    let target = tables
        .iter()
        .find(|t| t.physical_name.eq_ignore_ascii_case(&fk.references_table))?;
    let public = |owner: &VirtualTable, physical: &[String]| -> Option<Vec<String>> {
        physical
            .iter()
            .map(|name| {
                owner
                    .columns
                    .iter()
                    .find(|c| c.physical_name.eq_ignore_ascii_case(name))
                    .map(|c| c.name.clone())
            })
            .collect()
    };

    Some(VirtualForeignKey {
        columns: public(table, &fk.columns)?,
        references_table: target.name.clone(),
        references_columns: public(target, &fk.references_columns)?,
    })
}
