//! reqwest adapter for the ML worker API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{MlClientError, Result};
use crate::ports::{MlClientFactory, MlNodeClient};
use crate::types::{
    GpuInfo, HealthResponse, InferenceUpRequest, PocBatchV1, PocGenerateRequestV2,
    PocInitGenerateV1, PocInitGenerateV2, PocInitValidateV1, PowStatus, PowStatusResponse,
    TrainingStartRequest,
};

/// Default per-request timeout against a worker.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP client for one ML worker, addressed by its PoC and inference URLs.
pub struct HttpMlNodeClient {
    http: Client,
    poc_url: String,
    inference_url: String,
    timeout: Duration,
}

impl HttpMlNodeClient {
    /// Create a client over a shared reqwest pool.
    pub fn new(http: Client, poc_url: &str, inference_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            poc_url: poc_url.trim_end_matches('/').to_string(),
            inference_url: inference_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn map_err(&self, url: &str, e: reqwest::Error) -> MlClientError {
        if e.is_timeout() {
            MlClientError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            MlClientError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }

    async fn check_status(url: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        let mut message = message.trim().to_string();
        message.truncate(512);
        Err(MlClientError::Application {
            url: url.to_string(),
            status: status.as_u16(),
            message,
        })
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: String, body: &B) -> Result<()> {
        debug!(%url, "[ig-01] POST");
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_err(&url, e))?;
        Self::check_status(&url, response).await?;
        Ok(())
    }

    async fn post_empty(&self, url: String) -> Result<()> {
        debug!(%url, "[ig-01] POST");
        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_err(&url, e))?;
        Self::check_status(&url, response).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        debug!(%url, "[ig-01] GET");
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_err(&url, e))?;
        let response = Self::check_status(&url, response).await?;
        response.json::<T>().await.map_err(|e| MlClientError::Decode {
            url,
            message: e.to_string(),
        })
    }

    fn poc(&self, path: &str) -> String {
        format!("{}{}", self.poc_url, path)
    }

    fn inference(&self, path: &str) -> String {
        format!("{}{}", self.inference_url, path)
    }
}

#[async_trait]
impl MlNodeClient for HttpMlNodeClient {
    async fn health(&self) -> Result<bool> {
        let health: HealthResponse = self.get_json(self.inference("/api/v1/health")).await?;
        Ok(health.healthy)
    }

    async fn stop(&self) -> Result<()> {
        self.post_empty(self.inference("/api/v1/stop")).await
    }

    async fn inference_up(&self, model: &str, args: &[String]) -> Result<()> {
        let body = InferenceUpRequest {
            model: model.to_string(),
            args: args.to_vec(),
        };
        self.post_json(self.inference("/api/v1/inference/up"), &body)
            .await
    }

    async fn inference_health(&self) -> Result<bool> {
        let health: HealthResponse = self
            .get_json(self.inference("/api/v1/inference/health"))
            .await?;
        Ok(health.healthy)
    }

    async fn init_generate_v2(&self, req: &PocInitGenerateV2) -> Result<()> {
        self.post_json(self.poc("/api/v1/inference/pow/init/generate"), req)
            .await
    }

    async fn generate_v2(&self, req: &PocGenerateRequestV2) -> Result<()> {
        self.post_json(self.poc("/api/v1/inference/pow/generate"), req)
            .await
    }

    async fn pow_status_v2(&self) -> Result<PowStatus> {
        let status: PowStatusResponse = self
            .get_json(self.poc("/api/v1/inference/pow/status"))
            .await?;
        Ok(status.status)
    }

    async fn stop_pow_v2(&self) -> Result<()> {
        self.post_empty(self.poc("/api/v1/inference/pow/stop")).await
    }

    async fn init_generate_v1(&self, req: &PocInitGenerateV1) -> Result<()> {
        self.post_json(self.poc("/api/v1/pow/init/generate"), req)
            .await
    }

    async fn init_validate_v1(&self, req: &PocInitValidateV1) -> Result<()> {
        self.post_json(self.poc("/api/v1/pow/init/validate"), req)
            .await
    }

    async fn validate_batch_v1(&self, batch: &PocBatchV1) -> Result<()> {
        self.post_json(self.poc("/api/v1/pow/validate"), batch).await
    }

    async fn pow_status_v1(&self) -> Result<PowStatus> {
        let status: PowStatusResponse = self.get_json(self.poc("/api/v1/pow/status")).await?;
        Ok(status.status)
    }

    async fn start_training(&self, req: &TrainingStartRequest) -> Result<()> {
        self.post_json(self.inference("/api/v1/train/start"), req)
            .await
    }

    async fn gpu_info(&self) -> Result<Vec<GpuInfo>> {
        self.get_json(self.inference("/api/v1/gpu")).await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        self.get_json(self.inference("/api/v1/models")).await
    }

    async fn download_model(&self, model: &str) -> Result<()> {
        self.post_json(
            self.inference("/api/v1/models/download"),
            &serde_json::json!({ "model": model }),
        )
        .await
    }
}

/// Production factory: one shared reqwest pool, per-request clients.
pub struct HttpClientFactory {
    http: Client,
    timeout: Duration,
}

impl HttpClientFactory {
    /// Create a factory with the default request timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a factory with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            timeout,
        }
    }
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MlClientFactory for HttpClientFactory {
    fn create(&self, poc_url: &str, inference_url: &str) -> Arc<dyn MlNodeClient> {
        Arc::new(HttpMlNodeClient::new(
            self.http.clone(),
            poc_url,
            inference_url,
            self.timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining_strips_trailing_slash() {
        let client = HttpMlNodeClient::new(
            Client::new(),
            "http://h:5000/",
            "http://h:8080",
            DEFAULT_REQUEST_TIMEOUT,
        );
        assert_eq!(
            client.poc("/api/v1/inference/pow/status"),
            "http://h:5000/api/v1/inference/pow/status"
        );
        assert_eq!(client.inference("/api/v1/health"), "http://h:8080/api/v1/health");
    }
}
