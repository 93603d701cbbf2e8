use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{
    BatchRequest, BatchResponse, CpdChange, CpdListResponse, CpdRecord, QueryRequest,
    QueryResponse,
};
use super::InferenceBackend;
use crate::config::{InferenceConfig, RequestConfig};
use crate::error::{BackendError, BackendResult};
use crate::network::NetworkNode;

const CPDS_PATH: &str = "/api/prereq/cpds";
const BATCH_PATH: &str = "/api/prereq/cpds/batch";
const STRUCTURE_PATH: &str = "/api/prereq/structure";
const QUERY_PATH: &str = "/api/teacher/manual-query";

/// HTTP client for the inference backend
#[derive(Clone)]
pub struct InferenceClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    request_config: RequestConfig,
}

impl InferenceClient {
    /// Create a new inference client
    pub fn new(config: &InferenceConfig, request_config: RequestConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(BackendError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET with the configured retry policy
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> BackendResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let max_retries = self.request_config.max_retries;
        let mut retries = 0;

        loop {
            if retries > 0 {
                let delay = backoff_delay(self.request_config.retry_delay_ms, retries);
                warn!(
                    path = %path,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying inference backend request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            let result = self
                .send(self.authorize(self.client.get(&url).query(query)))
                .await;

            match result {
                Ok(response) => {
                    debug!(
                        path = %path,
                        latency_ms = start.elapsed().as_millis(),
                        "Inference backend GET succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    error!(
                        path = %path,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Inference backend GET failed"
                    );

                    if max_retries == 0 || !is_retryable(&e) {
                        return Err(e);
                    }
                    if retries >= max_retries {
                        return Err(BackendError::Unavailable {
                            message: e.to_string(),
                            retries,
                        });
                    }
                    retries += 1;
                }
            }
        }
    }

    /// POST once; writes are never retried
    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> BackendResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let start = Instant::now();

        let result = self
            .send(
                self.authorize(self.client.post(&url))
                    .header("Content-Type", "application/json")
                    .json(body),
            )
            .await;

        match &result {
            Ok(_) => debug!(
                path = %path,
                latency_ms = start.elapsed().as_millis(),
                "Inference backend POST succeeded"
            ),
            Err(e) => error!(
                path = %path,
                error = %e,
                latency_ms = start.elapsed().as_millis(),
                "Inference backend POST failed"
            ),
        }

        result
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Execute a single request (internal)
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> BackendResult<T> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout {
                    timeout_ms: self.request_config.timeout_ms,
                }
            } else {
                BackendError::Http(e)
            }
        })?;

        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    let status = response.status();

    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(BackendError::Api {
            status: status.as_u16(),
            message: error_body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| BackendError::InvalidResponse {
            message: format!("Failed to parse response: {}", e),
        })
}

/// Exponential backoff before retry number `retry` (1-based), saturating at `u64::MAX` ms.
fn backoff_delay(retry_delay_ms: u64, retry: u32) -> Duration {
    let factor = 2_u64.checked_pow(retry.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(retry_delay_ms.saturating_mul(factor))
}

/// Transport failures and server errors may succeed on retry; client errors will not.
fn is_retryable(error: &BackendError) -> bool {
    match error {
        BackendError::Api { status, .. } => *status >= 500,
        BackendError::Timeout { .. } | BackendError::Http(_) => true,
        BackendError::Unavailable { .. } | BackendError::InvalidResponse { .. } => false,
    }
}

#[async_trait]
impl InferenceBackend for InferenceClient {
    async fn fetch_cpds(&self, network: &str) -> BackendResult<BTreeMap<String, CpdRecord>> {
        let response: CpdListResponse = self.get_json(CPDS_PATH, &[("bif", network)]).await?;
        info!(
            network = %network,
            tables = response.cpds.len(),
            "Fetched CPDs"
        );
        Ok(response.cpds)
    }

    async fn apply_changes(&self, changes: &[CpdChange]) -> BackendResult<()> {
        let response: BatchResponse = self
            .post_json(BATCH_PATH, &BatchRequest { changes })
            .await?;
        info!(
            changes = changes.len(),
            message = response.message.as_deref().unwrap_or(""),
            "CPD batch applied"
        );
        Ok(())
    }

    async fn fetch_structure(&self, network: &str) -> BackendResult<Vec<NetworkNode>> {
        let nodes: Vec<NetworkNode> = self.get_json(STRUCTURE_PATH, &[("bif", network)]).await?;
        debug!(network = %network, nodes = nodes.len(), "Fetched network structure");
        Ok(nodes)
    }

    async fn query(&self, request: &QueryRequest) -> BackendResult<QueryResponse> {
        let response: QueryResponse = self.post_json(QUERY_PATH, request).await?;
        info!(
            network = %request.network,
            competency = %response.competency,
            probabilities = response.mastery_probabilities.as_ref().map(|p| p.len()).unwrap_or(0),
            "Mastery query completed"
        );
        Ok(response)
    }
}
