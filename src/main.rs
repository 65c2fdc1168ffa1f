use anyhow::Context;
use paper_pigeon::http::{AppState, HttpServer};
use paper_pigeon::PipelineConfig;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_file = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PIGEON_CONFIG").ok())
        .map(PathBuf::from);
    let config = PipelineConfig::load(config_file.as_deref()).context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();

    info!("Paper Pigeon graph server v{}", paper_pigeon::version());
    info!(
        "Store: {:?}, snapshot sources: {:?}, read-only: {}",
        config.store.kind, config.cache.snapshot_paths, config.cache.read_only
    );

    let state = AppState::from_config(&config).context("wiring the server")?;
    HttpServer::new(state, config.server.address())
        .start()
        .await
        .context("serving the graph API")?;

    Ok(())
}
