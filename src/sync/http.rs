use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{SyncBatch, SyncClient, SyncError, SyncMutation};
use crate::config::SyncConfig;
use crate::crypto::VaultParams;

/// JSON-over-HTTP sync client.
///
/// `POST {endpoint}/push` with `{"mutations": [...]}` and
/// `POST {endpoint}/pull` with `{"cursor": ...}`, which answers a [`SyncBatch`].
/// The vault record goes through `POST {endpoint}/vault/pull` and
/// `POST {endpoint}/vault/push`, both carrying `{"vault": ...}`.
#[derive(Debug, Clone)]
pub struct HttpSyncClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct PushRequest<'a> {
    mutations: &'a [SyncMutation],
}

#[derive(Serialize)]
struct PullRequest<'a> {
    cursor: Option<&'a str>,
}

#[derive(Serialize, Deserialize)]
struct VaultEnvelope<V> {
    vault: Option<V>,
}

impl HttpSyncClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lifelog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Client for the configured endpoint, or `NotConfigured`.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let endpoint = config.endpoint.as_deref().ok_or(SyncError::NotConfigured)?;
        Self::new(endpoint, Duration::from_secs(config.timeout_secs))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response, SyncError> {
        let url = format!("{}/{path}", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(url = %url, status = %status, "sync request rejected");
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl SyncClient for HttpSyncClient {
    async fn push(&self, mutations: &[SyncMutation]) -> Result<(), SyncError> {
        if mutations.is_empty() {
            return Ok(());
        }
        self.post("push", &PushRequest { mutations }).await?;
        tracing::debug!(count = mutations.len(), "pushed mutations");
        Ok(())
    }

    async fn pull(&self, cursor: Option<&str>) -> Result<SyncBatch, SyncError> {
        let response = self.post("pull", &PullRequest { cursor }).await?;
        let batch: SyncBatch = response
            .json()
            .await
            .map_err(|e| SyncError::Payload(e.to_string()))?;
        tracing::debug!(count = batch.changes.len(), "pulled changes");
        Ok(batch)
    }

    async fn pull_vault(&self) -> Result<Option<VaultParams>, SyncError> {
        let response = self.post("vault/pull", &VaultEnvelope::<()> { vault: None }).await?;
        let envelope: VaultEnvelope<VaultParams> = response
            .json()
            .await
            .map_err(|e| SyncError::Payload(format!("vault: {e}")))?;
        Ok(envelope.vault)
    }

    async fn push_vault(&self, vault: &VaultParams) -> Result<(), SyncError> {
        self.post("vault/push", &VaultEnvelope { vault: Some(vault) }).await?;
        tracing::info!("published vault parameters");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_requires_endpoint() {
        let err = HttpSyncClient::from_config(&SyncConfig::default()).unwrap_err();
        assert!(matches!(err, SyncError::NotConfigured));
    }

    #[test]
    fn empty_vault_envelope_parses() {
        let envelope: VaultEnvelope<VaultParams> = serde_json::from_str(r#"{"vault": null}"#).unwrap();
        assert!(envelope.vault.is_none());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = HttpSyncClient::new("https://sync.example.com/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "https://sync.example.com/v1");
    }
}
