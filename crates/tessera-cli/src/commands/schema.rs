//! `tessera schema`.

use anyhow::Result;
use std::path::Path;

use super::Workspace;

pub async fn run(config_path: &Path, datasource: i64, user: &str) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let data_source = workspace.data_source(datasource).await?;
    let schema = workspace.virtual_schema(&data_source, user).await?;

    if schema.is_empty() {
        eprintln!("{} can see no tables of {}", user, data_source.display_name);
    }
    print!("{}", schema.to_ddl());
    Ok(())
}
