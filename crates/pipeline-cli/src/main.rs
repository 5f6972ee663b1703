//! Tire Degradation Pipeline - Main Entry Point

use pipeline_cli::{init_logging, AppConfig, AppContext, Command};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    let command = Command::parse(std::env::args().skip(1))?;
    info!("=== Tire Degradation Pipeline v{} ===", env!("CARGO_PKG_VERSION"));

    AppContext::new(config).run(command).await
}
