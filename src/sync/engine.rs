use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SyncClient;
use crate::error::StoreResult;
use crate::store::LocalStore;

/// What one sync pass did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub pushed: usize,
    pub applied: usize,
    /// Remote changes that lost last-writer-wins or were not applicable.
    pub skipped: usize,
    /// The local vault record was replaced by the shared one.
    pub vault_adopted: bool,
    pub synced_at: DateTime<Utc>,
}

/// Reconcile the vault record, push the outbox in batches, then pull and
/// apply remote changes.
///
/// Outbox rows are acknowledged only after the backend accepted their batch,
/// so an interrupted pass resends instead of losing changes.
pub async fn sync_once(
    store: &LocalStore,
    client: &dyn SyncClient,
    batch_size: usize,
) -> StoreResult<SyncReport> {
    let vault_adopted = reconcile_vault(store, client).await?;

    let batch_size = batch_size.max(1);
    let mut pushed = 0;
    loop {
        let batch = store.pending_mutations(batch_size).await?;
        let Some(last) = batch.last() else {
            break;
        };
        let last_seq = last.seq;
        client.push(&batch).await?;
        store.acknowledge(last_seq).await?;
        pushed += batch.len();
        if batch.len() < batch_size {
            break;
        }
    }

    let cursor = store.sync_cursor().await?;
    let pulled = client.pull(cursor.as_deref()).await?;
    let (mut applied, mut skipped) = (0, 0);
    for change in pulled.changes {
        if store.apply_remote(change).await? {
            applied += 1;
        } else {
            skipped += 1;
        }
    }
    if let Some(cursor) = pulled.cursor {
        store.set_sync_cursor(&cursor).await?;
    }

    let synced_at = Utc::now();
    store.mark_synced(synced_at).await?;
    tracing::info!(pushed, applied, skipped, vault_adopted, "sync pass complete");
    Ok(SyncReport {
        pushed,
        applied,
        skipped,
        vault_adopted,
        synced_at,
    })
}

/// Make sure this device and the backend agree on the vault record.
///
/// The first device to sync publishes its vault. After that the newer record
/// wins: a passphrase change here is published, one made elsewhere is adopted.
async fn reconcile_vault(store: &LocalStore, client: &dyn SyncClient) -> StoreResult<bool> {
    let local = store.vault_params().await?;
    let remote = client.pull_vault().await?;
    match (local, remote) {
        (None, None) => Ok(false),
        (Some(local), None) => {
            client.push_vault(&local).await?;
            Ok(false)
        }
        (Some(local), Some(remote)) if local.same_key_as(&remote) => Ok(false),
        (Some(local), Some(remote)) if local.updated_at > remote.updated_at => {
            client.push_vault(&local).await?;
            Ok(false)
        }
        (_, Some(remote)) => store.adopt_vault(remote).await,
    }
}
