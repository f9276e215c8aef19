//! Counting mock adapter.
//!
//! Used by the broker, validator, and integration tests. Counts every
//! operation by name, returns configurable statuses, and can inject a
//! transport failure per method.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{MlClientError, Result};
use crate::ports::{MlClientFactory, MlNodeClient};
use crate::types::{
    GpuInfo, PocBatchV1, PocGenerateRequestV2, PocInitGenerateV1, PocInitGenerateV2,
    PocInitValidateV1, PowStatus, TrainingStartRequest,
};

#[derive(Debug)]
struct MockState {
    calls: HashMap<String, u32>,
    healthy: bool,
    inference_healthy: bool,
    pow_status_v2: PowStatus,
    pow_status_v1: PowStatus,
    fail_methods: HashMap<String, String>,
    last_inference_up: Option<(String, Vec<String>)>,
    models: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: HashMap::new(),
            healthy: true,
            inference_healthy: false,
            pow_status_v2: PowStatus::Idle,
            pow_status_v1: PowStatus::Idle,
            fail_methods: HashMap::new(),
            last_inference_up: None,
            models: Vec::new(),
        }
    }
}

/// Shared, clonable counting mock of one ML worker.
#[derive(Clone, Default)]
pub struct MockMlNodeClient {
    state: Arc<Mutex<MockState>>,
}

impl MockMlNodeClient {
    /// Fresh mock with default state (healthy worker, inference down,
    /// PoC idle).
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, method: &str) -> Result<()> {
        let mut state = self.state.lock().expect("mock state poisoned");
        *state.calls.entry(method.to_string()).or_insert(0) += 1;
        if let Some(message) = state.fail_methods.get(method) {
            return Err(MlClientError::Transport {
                url: format!("mock://{method}"),
                message: message.clone(),
            });
        }
        Ok(())
    }

    /// Number of calls recorded for a method name.
    pub fn calls(&self, method: &str) -> u32 {
        self.state
            .lock()
            .expect("mock state poisoned")
            .calls
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    /// Inject a transport failure for a method.
    pub fn fail_method(&self, method: &str, message: &str) {
        self.state
            .lock()
            .expect("mock state poisoned")
            .fail_methods
            .insert(method.to_string(), message.to_string());
    }

    /// Clear an injected failure.
    pub fn heal_method(&self, method: &str) {
        self.state
            .lock()
            .expect("mock state poisoned")
            .fail_methods
            .remove(method);
    }

    /// Set the V2 PoC status the mock reports.
    pub fn set_pow_status_v2(&self, status: PowStatus) {
        self.state.lock().expect("mock state poisoned").pow_status_v2 = status;
    }

    /// Set the V1 PoC status the mock reports.
    pub fn set_pow_status_v1(&self, status: PowStatus) {
        self.state.lock().expect("mock state poisoned").pow_status_v1 = status;
    }

    /// Set the inference-plane health the mock reports.
    pub fn set_inference_healthy(&self, healthy: bool) {
        self.state
            .lock()
            .expect("mock state poisoned")
            .inference_healthy = healthy;
    }

    /// Set the models the mock lists.
    pub fn set_models(&self, models: Vec<String>) {
        self.state.lock().expect("mock state poisoned").models = models;
    }

    /// Last `(model, args)` passed to `inference_up`.
    pub fn last_inference_up(&self) -> Option<(String, Vec<String>)> {
        self.state
            .lock()
            .expect("mock state poisoned")
            .last_inference_up
            .clone()
    }
}

#[async_trait]
impl MlNodeClient for MockMlNodeClient {
    async fn health(&self) -> Result<bool> {
        self.record("health")?;
        Ok(self.state.lock().expect("mock state poisoned").healthy)
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop")?;
        let mut state = self.state.lock().expect("mock state poisoned");
        state.inference_healthy = false;
        state.pow_status_v2 = PowStatus::Stopped;
        Ok(())
    }

    async fn inference_up(&self, model: &str, args: &[String]) -> Result<()> {
        self.record("inference_up")?;
        let mut state = self.state.lock().expect("mock state poisoned");
        state.inference_healthy = true;
        state.last_inference_up = Some((model.to_string(), args.to_vec()));
        Ok(())
    }

    async fn inference_health(&self) -> Result<bool> {
        self.record("inference_health")?;
        Ok(self
            .state
            .lock()
            .expect("mock state poisoned")
            .inference_healthy)
    }

    async fn init_generate_v2(&self, _req: &PocInitGenerateV2) -> Result<()> {
        self.record("init_generate_v2")?;
        self.state.lock().expect("mock state poisoned").pow_status_v2 = PowStatus::Generating;
        Ok(())
    }

    async fn generate_v2(&self, _req: &PocGenerateRequestV2) -> Result<()> {
        self.record("generate_v2")
    }

    async fn pow_status_v2(&self) -> Result<PowStatus> {
        self.record("pow_status_v2")?;
        Ok(self.state.lock().expect("mock state poisoned").pow_status_v2)
    }

    async fn stop_pow_v2(&self) -> Result<()> {
        self.record("stop_pow_v2")?;
        self.state.lock().expect("mock state poisoned").pow_status_v2 = PowStatus::Stopped;
        Ok(())
    }

    async fn init_generate_v1(&self, _req: &PocInitGenerateV1) -> Result<()> {
        self.record("init_generate_v1")?;
        self.state.lock().expect("mock state poisoned").pow_status_v1 = PowStatus::Generating;
        Ok(())
    }

    async fn init_validate_v1(&self, _req: &PocInitValidateV1) -> Result<()> {
        self.record("init_validate_v1")?;
        self.state.lock().expect("mock state poisoned").pow_status_v1 = PowStatus::Validating;
        Ok(())
    }

    async fn validate_batch_v1(&self, _batch: &PocBatchV1) -> Result<()> {
        self.record("validate_batch_v1")
    }

    async fn pow_status_v1(&self) -> Result<PowStatus> {
        self.record("pow_status_v1")?;
        Ok(self.state.lock().expect("mock state poisoned").pow_status_v1)
    }

    async fn start_training(&self, _req: &TrainingStartRequest) -> Result<()> {
        self.record("start_training")
    }

    async fn gpu_info(&self) -> Result<Vec<GpuInfo>> {
        self.record("gpu_info")?;
        Ok(vec![])
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        self.record("list_models")?;
        Ok(self.state.lock().expect("mock state poisoned").models.clone())
    }

    async fn download_model(&self, _model: &str) -> Result<()> {
        self.record("download_model")
    }
}

/// Factory handing out one mock per PoC URL, so multi-node tests can
/// inspect each worker independently.
#[derive(Default)]
pub struct MockClientFactory {
    clients: Mutex<HashMap<String, MockMlNodeClient>>,
}

impl MockClientFactory {
    /// Fresh factory with no pre-registered mocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mock serving a PoC URL, creating it on first use.
    pub fn client_for(&self, poc_url: &str) -> MockMlNodeClient {
        self.clients
            .lock()
            .expect("mock factory poisoned")
            .entry(poc_url.to_string())
            .or_default()
            .clone()
    }
}

impl MlClientFactory for MockClientFactory {
    fn create(&self, poc_url: &str, _inference_url: &str) -> Arc<dyn MlNodeClient> {
        Arc::new(self.client_for(poc_url))
    }
}
