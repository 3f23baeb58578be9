//! `tessera rewrite`.

use anyhow::Result;
use std::path::Path;
use tessera_rls::{RewriteEngine, SubqueryRewriter};

use super::Workspace;

pub async fn run(config_path: &Path, datasource: i64, user: &str, sql: &str) -> Result<()> {
    let workspace = Workspace::load(config_path)?;
    let data_source = workspace.data_source(datasource).await?;
    let schema = workspace.virtual_schema(&data_source, user).await?;

    let native = SubqueryRewriter::new().rewrite(&schema, sql)?;
    println!("{}", native);
    Ok(())
}
