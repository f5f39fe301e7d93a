#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use lifelog::app::App;
use lifelog::config::EncryptionConfig;
use lifelog::crypto::{DerivedKey, KdfParams, VaultParams, KDF_ALGORITHM};
use lifelog::state::StateStore;
use lifelog::store::questions::{builtin_catalog, merge_catalog};
use lifelog::store::LocalStore;
use lifelog::sync::{RemoteChange, SyncBatch, SyncClient, SyncError, SyncMutation};

/// Argon2 parameters small enough for tests.
pub fn fast_encryption() -> EncryptionConfig {
    EncryptionConfig {
        argon2_memory_kib: 64,
        argon2_iterations: 1,
        argon2_parallelism: 1,
    }
}

/// A fixed key built from raw bytes. Different `seed`s give unrelated keys.
pub fn test_key(seed: u8) -> DerivedKey {
    let kdf = KdfParams {
        algorithm: KDF_ALGORITHM.to_string(),
        salt: format!("{seed:0>4}AAAAAAAAAAAAAAAAAA=="),
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    };
    DerivedKey::from_bytes([seed; 32], kdf)
}

/// In-memory store with the built-in catalog seeded and no key or vault.
pub async fn locked_store() -> LocalStore {
    let store = LocalStore::open_in_memory(fast_encryption()).unwrap();
    store
        .seed_questions(merge_catalog(builtin_catalog(), Vec::new()))
        .await
        .unwrap();
    store
}

/// In-memory store with the built-in catalog seeded and `test_key(1)` installed.
pub async fn unlocked_store() -> LocalStore {
    let store = locked_store().await;
    store.set_key(test_key(1));
    store
}

/// Hydrated app over an unlocked in-memory store.
pub async fn test_app(sync: Option<Arc<dyn SyncClient>>) -> App {
    let store = unlocked_store().await;
    let app = App::new(store, Arc::new(StateStore::new()), sync, 10);
    app.hydrate().await.unwrap();
    app
}

/// Hydrated app over a fresh store that has never been unlocked.
pub async fn locked_app(sync: Option<Arc<dyn SyncClient>>) -> App {
    let app = App::new(locked_store().await, Arc::new(StateStore::new()), sync, 10);
    app.hydrate().await.unwrap();
    app
}

/// A fixed UTC instant `minutes` after 2024-05-01T09:00:00Z.
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// In-process sync backend. Records every push and serves queued changes on pull.
#[derive(Default)]
pub struct MemoryBackend {
    pub pushed: Mutex<Vec<SyncMutation>>,
    pub incoming: Mutex<Vec<RemoteChange>>,
    pub push_calls: AtomicUsize,
    pub pull_calls: AtomicUsize,
    pub vault: Mutex<Option<VaultParams>>,
    pub vault_calls: AtomicUsize,
    pub offline: AtomicBool,
}

impl MemoryBackend {
    /// Every request of any kind.
    pub fn calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
            + self.pull_calls.load(Ordering::SeqCst)
            + self.vault_calls.load(Ordering::SeqCst)
    }

    /// Hand every pushed mutation back out on the next pull, as the real
    /// backend would to another device.
    pub fn relay_pushed(&self) {
        let pushed = std::mem::take(&mut *self.pushed.lock().unwrap());
        let mut incoming = self.incoming.lock().unwrap();
        incoming.extend(pushed.into_iter().map(|m| RemoteChange {
            table: m.table,
            entity_id: m.entity_id,
            operation: m.operation,
            payload: m.payload,
            updated_at: m.created_at,
        }));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn queue_remote(&self, change: RemoteChange) {
        self.incoming.lock().unwrap().push(change);
    }
}

#[async_trait]
impl SyncClient for MemoryBackend {
    async fn push(&self, mutations: &[SyncMutation]) -> Result<(), SyncError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("connection refused".into()));
        }
        self.pushed.lock().unwrap().extend_from_slice(mutations);
        Ok(())
    }

    async fn pull(&self, _cursor: Option<&str>) -> Result<SyncBatch, SyncError> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("connection refused".into()));
        }
        let changes = std::mem::take(&mut *self.incoming.lock().unwrap());
        let cursor = format!("c{}", self.pull_calls.load(Ordering::SeqCst));
        Ok(SyncBatch {
            changes,
            cursor: Some(cursor),
        })
    }

    async fn pull_vault(&self) -> Result<Option<VaultParams>, SyncError> {
        self.vault_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("connection refused".into()));
        }
        Ok(self.vault.lock().unwrap().clone())
    }

    async fn push_vault(&self, vault: &VaultParams) -> Result<(), SyncError> {
        self.vault_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("connection refused".into()));
        }
        *self.vault.lock().unwrap() = Some(vault.clone());
        Ok(())
    }
}
