//! Red Alert Monitor - Main Entry Point

use anyhow::Context;
use monitor::{init_logging, run, MonitorConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MonitorConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_logging(&config.log_file)?;

    info!("=== Red Alert Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    run(config).await
}
