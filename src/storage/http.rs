use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info};

use super::{ProgressKey, ProgressSnapshot, ProgressStore};
use crate::config::RequestConfig;
use crate::error::{StorageError, StorageResult};

/// Progress store backed by the platform's persistence API
#[derive(Clone)]
pub struct HttpProgressStore {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpProgressStore {
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        request_config: &RequestConfig,
    ) -> StorageResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| StorageError::Connection {
            message: format!("Invalid progress store URL '{}': {}", base_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::Connection {
                message: format!("Progress store URL '{}' cannot be a base", base_url),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    /// `{base}/api/progress/{student}/{domain}`, with the student id escaped
    fn snapshot_url(&self, key: &ProgressKey) -> StorageResult<Url> {
        let domain = key.domain_id.to_string();
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Connection {
                message: "Progress store URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(["api", "progress", key.student_id.as_str(), domain.as_str()]);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }
}

async fn ensure_success(response: Response) -> StorageResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Remote {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ProgressStore for HttpProgressStore {
    async fn get_snapshot(&self, key: &ProgressKey) -> StorageResult<ProgressSnapshot> {
        let url = self.snapshot_url(key)?;
        let response = self.authorize(self.client.get(url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(key = %key, "No remote progress snapshot");
            return Ok(ProgressSnapshot::new());
        }

        let snapshot: ProgressSnapshot = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::InvalidData {
                message: format!("Failed to parse progress snapshot: {}", e),
            })?;

        debug!(key = %key, nodes = snapshot.len(), "Fetched remote progress snapshot");
        Ok(snapshot)
    }

    async fn save_snapshot(&self, key: &ProgressKey, snapshot: &ProgressSnapshot) -> StorageResult<()> {
        let url = self.snapshot_url(key)?;
        let response = self
            .authorize(self.client.post(url))
            .json(snapshot)
            .send()
            .await?;
        ensure_success(response).await?;

        info!(key = %key, nodes = snapshot.len(), "Saved remote progress snapshot");
        Ok(())
    }

    async fn delete_snapshot(&self, key: &ProgressKey) -> StorageResult<()> {
        let url = self.snapshot_url(key)?;
        let response = self.authorize(self.client.delete(url)).send().await?;

        // Deleting a snapshot that was never saved is not an error.
        if response.status() != StatusCode::NOT_FOUND {
            ensure_success(response).await?;
        }

        info!(key = %key, "Deleted remote progress snapshot");
        Ok(())
    }
}
