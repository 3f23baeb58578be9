//! `tessera policy`: the effective policy of a user, as JSON.

use anyhow::Result;
use serde_json::json;
use std::path::Path;

use super::Workspace;

pub async fn run(config_path: &Path, datasource: i64, user: &str) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let data_source = workspace.data_source(datasource).await?;
    let roles = workspace.roles(user).await?;
    let policy = workspace.policy(&data_source, &roles).await?;

    let tables: Vec<_> = policy
        .tables
        .iter()
        .map(|table| {
            json!({
                "name": table.name,
                "public_name": table.public_name(),
                "columns": policy
                    .columns_of(table.id)
                    .map(|c| c.public_name().to_string())
                    .collect::<Vec<_>>(),
                "filter": policy.filter_for(table.id),
            })
        })
        .collect();

    let report = json!({
        "datasource": data_source.display_name,
        "user": user,
        "roles": roles,
        "tables": tables,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
