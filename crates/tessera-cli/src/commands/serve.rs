//! `tessera serve`.

use anyhow::{Context, Result};
use std::path::Path;
use tessera_core::TesseraConfig;

pub async fn run(config_path: &Path, bind: Option<String>) -> Result<()> {
    let mut config = TesseraConfig::load_with_context(config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    tessera_server::init_tracing(&config.observability.log_level);
    tracing::info!(config = %config_path.display(), "Starting tessera");
    tessera_server::serve(&config).await
}
