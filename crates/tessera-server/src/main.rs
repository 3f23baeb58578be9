use anyhow::Context;
use tessera_core::TesseraConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TESSERA_CONFIG").ok())
        .unwrap_or_else(|| "tessera.yaml".to_string());

    let config = TesseraConfig::load_with_context(&path)
        .with_context(|| format!("failed to load configuration from {}", path))?;
    tessera_server::init_tracing(&config.observability.log_level);

    tessera_server::serve(&config).await
}
