//! Broker configuration and participant identity.

use serde::Deserialize;

/// Static broker limits.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Maximum registered nodes.
    pub max_nodes: usize,
    /// Command channel depth.
    pub command_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_nodes: 64,
            command_buffer: 256,
        }
    }
}

/// Identity of the participant this broker serves; flows into PoC init
/// payloads and callbacks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerIdentity {
    /// Participant account address.
    pub participant_address: String,
    /// Participant account pubkey, hex encoded.
    pub participant_pubkey_hex: String,
    /// Public base URL of this node's callback API.
    pub callback_url: String,
}

impl BrokerIdentity {
    /// Callback URL for V2 PoC batches.
    pub fn poc_batches_url(&self) -> String {
        format!("{}/v2/poc-batches", self.callback_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poc_batches_url() {
        let identity = BrokerIdentity {
            participant_address: "grid1abc".to_string(),
            participant_pubkey_hex: "02ff".to_string(),
            callback_url: "http://api.example.com:9000/".to_string(),
        };
        assert_eq!(
            identity.poc_batches_url(),
            "http://api.example.com:9000/v2/poc-batches"
        );
    }
}
