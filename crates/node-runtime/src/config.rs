//! Runtime configuration.
//!
//! Loaded from a TOML file; the account secret comes from the
//! environment (`GRID_ACCOUNT_SECRET_HEX`) so it never lands on disk
//! next to the config.

use std::path::Path;

use serde::Deserialize;
use shared_types::MlNodeConfig;

/// Chain daemon access.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// REST base URL of the participant's chain daemon.
    pub base_url: String,
    /// Participant account address.
    pub account_address: String,
    /// Poll interval for the chain follower, in milliseconds.
    #[serde(default = "default_poll_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_ms() -> u64 {
    500
}

/// Gateway listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Bind address, e.g. `0.0.0.0:9000`.
    pub listen_addr: String,
    /// Public base URL other participants and workers reach us at.
    pub public_url: String,
}

/// Broker settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BrokerSettings {
    /// Maximum registered nodes (0 = default).
    #[serde(default)]
    pub max_nodes: usize,
    /// Periodic status probe interval in seconds (0 = default).
    #[serde(default)]
    pub probe_interval_secs: u64,
}

/// Validator settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ValidatorSettings {
    /// Worker pool size (0 = default).
    #[serde(default)]
    pub worker_count: usize,
    /// Retries per participant (0 = default).
    #[serde(default)]
    pub max_retries: u32,
}

/// Top-level node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Chain access.
    pub chain: ChainConfig,
    /// Gateway listener.
    pub gateway: GatewayConfig,
    /// Broker tuning.
    #[serde(default)]
    pub broker: BrokerSettings,
    /// Validator tuning.
    #[serde(default)]
    pub validator: ValidatorSettings,
    /// ML worker nodes registered at startup.
    #[serde(default)]
    pub nodes: Vec<MlNodeConfig>,
}

impl NodeConfig {
    /// Load and parse a TOML config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Account secret from the environment, hex encoded.
    pub fn account_secret_hex() -> anyhow::Result<String> {
        std::env::var("GRID_ACCOUNT_SECRET_HEX")
            .map_err(|_| anyhow::anyhow!("GRID_ACCOUNT_SECRET_HEX is not set"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parses() {
        let config: NodeConfig = toml::from_str(
            r#"
            [chain]
            base_url = "http://localhost:1317"
            account_address = "grid1self"

            [gateway]
            listen_addr = "0.0.0.0:9000"
            public_url = "http://api.example.com:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.chain.poll_interval_ms, 500);
        assert!(config.nodes.is_empty());
        assert_eq!(config.broker.max_nodes, 0);
    }

    #[test]
    fn test_full_config_parses() {
        let config: NodeConfig = toml::from_str(
            r#"
            [chain]
            base_url = "http://localhost:1317"
            account_address = "grid1self"
            poll_interval_ms = 250

            [gateway]
            listen_addr = "0.0.0.0:9000"
            public_url = "http://api.example.com:9000"

            [broker]
            max_nodes = 16
            probe_interval_secs = 15

            [validator]
            worker_count = 4
            max_retries = 5

            [[nodes]]
            id = "node1"
            host = "10.0.0.5"
            inference_port = 8080
            poc_port = 5000
            max_concurrent = 8
            models = [{ id = "model1", args = ["--gpu-fraction=0.9"] }]
            "#,
        )
        .unwrap();

        assert_eq!(config.broker.max_nodes, 16);
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.nodes[0].models[0].id, "model1");
    }
}
