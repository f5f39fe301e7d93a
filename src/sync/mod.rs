//! Boundary to the remote sync backend.
//!
//! The local store never depends on sync: every write lands in SQLite first
//! and is queued in the outbox. [`engine::sync_once`] pushes that queue through
//! a [`SyncClient`] and applies what the backend sends back.
//!
//! Besides rows, the backend keeps one [`VaultParams`] record so every device
//! derives the same key from the shared passphrase.

pub mod engine;
pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::VaultParams;
use crate::store::events::{ChangeKind, Table};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync is not configured")]
    NotConfigured,
    #[error("sync backend unreachable: {0}")]
    Transport(String),
    #[error("sync backend rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid sync payload: {0}")]
    Payload(String),
}

/// One queued local change, as pushed to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMutation {
    /// Outbox sequence number; monotonically increasing.
    pub seq: i64,
    pub table: Table,
    pub entity_id: String,
    pub operation: ChangeKind,
    /// Sealed entity for puts, `None` for deletes.
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// One change pulled from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteChange {
    pub table: Table,
    pub entity_id: String,
    pub operation: ChangeKind,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    /// Compared against the local row for last-writer-wins.
    pub updated_at: DateTime<Utc>,
}

/// Response to a pull.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncBatch {
    #[serde(default)]
    pub changes: Vec<RemoteChange>,
    /// Opaque position to resume from next time.
    #[serde(default)]
    pub cursor: Option<String>,
}

/// The remote half of sync. Implementations must be cheap to share.
#[async_trait]
pub trait SyncClient: Send + Sync {
    /// Deliver mutations in order. Success means all of them were accepted.
    async fn push(&self, mutations: &[SyncMutation]) -> Result<(), SyncError>;

    /// Changes since `cursor` (`None` for everything).
    async fn pull(&self, cursor: Option<&str>) -> Result<SyncBatch, SyncError>;

    /// The shared vault record, if a device has published one.
    async fn pull_vault(&self) -> Result<Option<VaultParams>, SyncError>;

    /// Publish this device's vault record, replacing the shared one.
    async fn push_vault(&self, vault: &VaultParams) -> Result<(), SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_tolerates_missing_fields() {
        let batch: SyncBatch = serde_json::from_str("{}").unwrap();
        assert!(batch.changes.is_empty());
        assert!(batch.cursor.is_none());
    }

    #[test]
    fn remote_delete_parses_without_payload() {
        let change: RemoteChange = serde_json::from_value(serde_json::json!({
            "table": "recordings",
            "entity_id": "r1",
            "operation": "delete",
            "updated_at": "2024-05-01T10:00:00Z",
        }))
        .unwrap();
        assert_eq!(change.operation, ChangeKind::Delete);
        assert!(change.payload.is_none());
    }
}
