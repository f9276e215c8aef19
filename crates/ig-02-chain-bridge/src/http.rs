//! reqwest REST adapter for the participant's chain daemon.
//!
//! Queries hit the daemon's read API; submissions are wrapped in a signed
//! envelope `{msg, signer, pubkey, signature}` where the signature covers
//! the serialized message bytes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::{
    BlockHeight, BlockInfo, ChainParams, ConfirmationPocEvent, EpochGroupData, EpochInfo,
    GovernanceModel, MsgHardwareDiff, MsgPocBatch, MsgPocValidation, MsgPocValidationsV2,
    MsgStoreCommit, MsgWeightDistribution, ParticipantInfo, StoreCommitRecord, ValidationSnapshot,
};
use tracing::debug;

use crate::error::{ChainBridgeError, Result};
use crate::ports::{ChainBridge, Signer};

/// Default timeout for daemon requests.
pub const DEFAULT_CHAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Signed submission envelope.
#[derive(Debug, Serialize)]
struct SignedTx<'a, T: Serialize> {
    msg: &'a T,
    signer: &'a str,
    pubkey: String,
    /// Hex-encoded signature over the serialized `msg` bytes.
    signature: String,
}

/// Envelope for optional query results.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct MaybeFound<T> {
    found: bool,
    #[serde(default)]
    value: Option<T>,
}

/// HTTP adapter over the chain daemon's REST API.
pub struct HttpChainBridge {
    http: Client,
    base_url: String,
    signer: Arc<dyn Signer>,
    timeout: Duration,
}

impl HttpChainBridge {
    /// Create an adapter for a daemon base URL.
    pub fn new(base_url: &str, signer: Arc<dyn Signer>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
            timeout: DEFAULT_CHAIN_TIMEOUT,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(%url, "[ig-02] GET");
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ChainBridgeError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ChainBridgeError::NotFound(path.to_string())),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| ChainBridgeError::Decode(e.to_string())),
            status => Err(ChainBridgeError::Transport(format!(
                "{url}: status {status}"
            ))),
        }
    }

    async fn submit<T: Serialize>(&self, path: &str, msg: &T) -> Result<()> {
        let body = serde_json::to_vec(msg).map_err(|e| ChainBridgeError::Decode(e.to_string()))?;
        let envelope = SignedTx {
            msg,
            signer: self.signer.address(),
            pubkey: self.signer.pubkey_hex(),
            signature: hex::encode(self.signer.sign(&body)),
        };

        let url = self.url(path);
        debug!(%url, "[ig-02] SUBMIT");
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| ChainBridgeError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(ChainBridgeError::Rejected(format!("{status}: {message}")))
        } else {
            Err(ChainBridgeError::Transport(format!("{status}: {message}")))
        }
    }
}

#[async_trait]
impl ChainBridge for HttpChainBridge {
    async fn params(&self) -> Result<ChainParams> {
        self.get("/v1/params").await
    }

    async fn current_epoch(&self) -> Result<EpochInfo> {
        self.get("/v1/epochs/current").await
    }

    async fn latest_block(&self) -> Result<BlockInfo> {
        self.get("/v1/blocks/latest").await
    }

    async fn block_hash(&self, height: BlockHeight) -> Result<String> {
        let block: BlockInfo = self.get(&format!("/v1/blocks/{height}")).await?;
        Ok(block.hash)
    }

    async fn epoch_group_by_model(
        &self,
        poc_height: BlockHeight,
        model_id: &str,
    ) -> Result<EpochGroupData> {
        self.get(&format!("/v1/epochs/{poc_height}/groups/{model_id}"))
            .await
    }

    async fn store_commits_for_stage(
        &self,
        stage_height: BlockHeight,
    ) -> Result<Vec<StoreCommitRecord>> {
        self.get(&format!("/v1/poc/{stage_height}/commits")).await
    }

    async fn validation_snapshot(
        &self,
        stage_height: BlockHeight,
    ) -> Result<Option<ValidationSnapshot>> {
        let result: MaybeFound<ValidationSnapshot> = self
            .get(&format!("/v1/poc/{stage_height}/validation-snapshot"))
            .await?;
        Ok(if result.found { result.value } else { None })
    }

    async fn governance_models(&self) -> Result<Vec<GovernanceModel>> {
        self.get("/v1/governance/models").await
    }

    async fn participant(&self, address: &str) -> Result<ParticipantInfo> {
        self.get(&format!("/v1/participants/{address}")).await
    }

    async fn active_confirmation_event(&self) -> Result<Option<ConfirmationPocEvent>> {
        let result: MaybeFound<ConfirmationPocEvent> =
            self.get("/v1/poc/confirmation/active").await?;
        Ok(if result.found { result.value } else { None })
    }

    async fn poc_batches_for_stage(
        &self,
        stage_height: BlockHeight,
    ) -> Result<Vec<(String, MsgPocBatch)>> {
        self.get(&format!("/v1/poc/{stage_height}/batches")).await
    }

    async fn submit_hardware_diff(&self, msg: MsgHardwareDiff) -> Result<()> {
        self.submit("/v1/tx/hardware-diff", &msg).await
    }

    async fn submit_store_commit(&self, msg: MsgStoreCommit) -> Result<()> {
        self.submit("/v1/tx/poc-store-commit", &msg).await
    }

    async fn submit_weight_distribution(&self, msg: MsgWeightDistribution) -> Result<()> {
        self.submit("/v1/tx/weight-distribution", &msg).await
    }

    async fn submit_poc_validations_v2(&self, msg: MsgPocValidationsV2) -> Result<()> {
        self.submit("/v1/tx/poc-validations-v2", &msg).await
    }

    async fn submit_poc_batch(&self, msg: MsgPocBatch) -> Result<()> {
        self.submit("/v1/tx/poc-batch", &msg).await
    }

    async fn submit_poc_validation(&self, msg: MsgPocValidation) -> Result<()> {
        self.submit("/v1/tx/poc-validation", &msg).await
    }
}
