//! The Inference-Grid API node binary.

use std::path::PathBuf;

use anyhow::Result;
use grid_telemetry::{init_telemetry, TelemetryConfig};
use node_runtime::{run_node, NodeConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(&TelemetryConfig::from_env())?;

    info!("===========================================");
    info!("  Inference-Grid API Node v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let config_path = std::env::var("GRID_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = NodeConfig::load(&PathBuf::from(&config_path))?;
    info!("Configuration loaded from {config_path}");

    run_node(config).await
}
