//! The local store: encrypted-at-rest SQLite persistence with reactive reads.
//!
//! [`LocalStore`] is a cheap-to-clone handle. All SQLite and key-derivation
//! work runs on tokio's blocking pool behind one `Arc<Mutex<Connection>>`, so
//! async callers suspend instead of blocking the runtime. After each commit a
//! [`ChangeEvent`] goes out on the table's topic; [`LiveQuery`] listens there.
//!
//! Writes to the same entity id are queued and applied in submission order.

pub mod entries;
pub mod events;
pub mod outbox;
pub mod query;
pub mod questions;
pub mod recordings;
pub(crate) mod remote;
pub(crate) mod sealed;
pub mod settings;
pub mod stats;
pub(crate) mod tombstones;
pub mod types;
pub mod validate;
pub mod vault;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use zeroize::Zeroizing;

use crate::config::{EncryptionConfig, LifelogConfig};
use crate::crypto::{CryptoError, DerivedKey, KdfParams, KeyManager, VaultParams};
use crate::db::{self, migrations, HealthReport};
use crate::error::{StoreError, StoreResult};
use crate::sync::{RemoteChange, SyncMutation};

use events::{ChangeBus, ChangeEvent, ChangeKind, Table};
use query::{EntryQuery, LiveQuery, LiveSource, RecordingQuery};
use questions::QuestionSource;
use stats::StatsResponse;
use types::{
    EntrySummary, JournalEntry, Question, QuestionCategory, QuestionRef, Recording,
    RecordingSummary, UserSettings,
};
use validate::Validate;

/// Per-id FIFO locks. Slots live only while someone holds or waits on them.
#[derive(Clone, Default)]
struct WriteQueue {
    slots: Arc<Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>>,
}

impl WriteQueue {
    /// Wait for our turn on `table:id`. `tokio::sync::Mutex` is fair, so
    /// waiters are served in the order they arrived.
    async fn acquire(&self, table: Table, id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, slot| slot.strong_count() > 0);
            let key = format!("{table}:{id}");
            match slots.get(&key).and_then(Weak::upgrade) {
                Some(slot) => slot,
                None => {
                    let slot = Arc::new(tokio::sync::Mutex::new(()));
                    slots.insert(key, Arc::downgrade(&slot));
                    slot
                }
            }
        };
        slot.lock_owned().await
    }
}

/// Outcome of a re-encryption pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReencryptReport {
    pub recordings: usize,
    pub entries: usize,
    /// Rows the old key could not open. They are left untouched.
    pub failed: Vec<String>,
}

impl ReencryptReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Connection>>,
    keys: Arc<KeyManager>,
    bus: ChangeBus,
    queue: WriteQueue,
    encryption: EncryptionConfig,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Wrap an already-initialized connection.
    pub fn new(conn: Connection, encryption: EncryptionConfig, change_buffer: usize) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            keys: Arc::new(KeyManager::new()),
            bus: ChangeBus::new(change_buffer),
            queue: WriteQueue::default(),
            encryption,
            db_path: None,
        }
    }

    /// Open the database named by `config`, creating it if needed.
    pub fn open(config: &LifelogConfig) -> anyhow::Result<Self> {
        let path = config.resolved_db_path();
        let conn = db::open_database(&path)?;
        let mut store = Self::new(conn, config.encryption.clone(), config.storage.change_buffer);
        store.db_path = Some(path);
        Ok(store)
    }

    pub fn open_in_memory(encryption: EncryptionConfig) -> anyhow::Result<Self> {
        let conn = db::open_memory_database()?;
        Ok(Self::new(conn, encryption, 256))
    }

    pub fn db_path(&self) -> Option<&std::path::Path> {
        self.db_path.as_deref()
    }

    pub(crate) fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// Subscribe to raw change events on one table.
    pub fn subscribe(&self, table: Table) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
        self.bus.subscribe(table)
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| StoreError::Task(format!("db lock poisoned: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("database task failed: {e}")))?
    }

    fn write_key(&self) -> StoreResult<Arc<DerivedKey>> {
        self.keys.current().map_err(StoreError::encrypting)
    }

    fn read_key(&self) -> StoreResult<Arc<DerivedKey>> {
        self.keys.current().map_err(StoreError::decrypting)
    }

    // --- key management -------------------------------------------------

    /// Derive the session key from `passphrase` and install it.
    ///
    /// The first unlock of a database without a vault generates the KDF salt
    /// and seals a check value; later unlocks fail with `Decryption` on a
    /// wrong passphrase. A vault adopted from sync counts as existing.
    pub async fn unlock(&self, passphrase: &str) -> StoreResult<()> {
        let encryption = self.encryption.clone();
        let passphrase = Zeroizing::new(passphrase.to_string());
        let key = self
            .with_conn(move |conn| match vault::load_vault(conn)? {
                Some(existing) => existing.derive(&passphrase).map_err(|e| match e {
                    CryptoError::Decrypt(_) => StoreError::Decryption("wrong passphrase".into()),
                    other => StoreError::encrypting(other),
                }),
                None => {
                    let params = KdfParams::generate(&encryption);
                    let key = DerivedKey::derive(&passphrase, &params).map_err(StoreError::encrypting)?;
                    let sealed = VaultParams::seal(&key).map_err(StoreError::encrypting)?;
                    let tx = conn.transaction()?;
                    vault::save_vault(&tx, &sealed)?;
                    tx.commit()?;
                    tracing::info!("new vault created");
                    Ok(key)
                }
            })
            .await?;

        self.keys.set_key(key);
        tracing::info!("store unlocked");
        Ok(())
    }

    /// The active vault record, if one exists.
    pub async fn vault_params(&self) -> StoreResult<Option<VaultParams>> {
        self.with_conn(|conn| vault::load_vault(conn)).await
    }

    /// Take over a vault record published by another device.
    ///
    /// Without a local vault the remote one is installed as-is. When both
    /// exist and describe different keys, the newer record wins; the replaced
    /// local vault is kept as the previous vault, and the store locks if the
    /// session key belonged to it. Returns whether the local record changed.
    pub async fn adopt_vault(&self, remote: VaultParams) -> StoreResult<bool> {
        let incoming = remote.clone();
        let adopted = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let adopt = match vault::load_vault(&tx)? {
                    None => true,
                    Some(local) => {
                        !local.same_key_as(&incoming) && incoming.updated_at > local.updated_at
                    }
                };
                if adopt {
                    vault::replace_vault(&tx, &incoming)?;
                }
                tx.commit()?;
                Ok(adopt)
            })
            .await?;

        if adopted {
            tracing::info!("vault adopted from sync");
            if let Ok(key) = self.keys.current() {
                if *key.kdf() != remote.kdf {
                    self.keys.lock();
                    tracing::warn!("session key belongs to the replaced vault, store locked");
                }
            }
        }
        Ok(adopted)
    }

    /// Install a key obtained elsewhere (e.g. secure device storage). Returns the previous key.
    pub fn set_key(&self, key: DerivedKey) -> Option<Arc<DerivedKey>> {
        self.keys.set_key(key)
    }

    /// Forget the session key. Reads and writes of sealed fields fail until unlocked again.
    pub fn lock(&self) {
        self.keys.lock();
        tracing::info!("store locked");
    }

    pub fn is_unlocked(&self) -> bool {
        self.keys.is_unlocked()
    }

    /// Switch the vault to a new passphrase (fresh salt) and install the new key.
    ///
    /// Existing rows stay sealed under the old key and the old vault is kept
    /// as the previous vault. Pass the returned key to
    /// [`LocalStore::reencrypt_all`], or later the old passphrase to
    /// [`LocalStore::reencrypt_with_passphrase`], to migrate them.
    pub async fn change_passphrase(&self, new_passphrase: &str) -> StoreResult<Arc<DerivedKey>> {
        let old = self.write_key()?;
        let params = KdfParams::generate(&self.encryption);
        let passphrase = Zeroizing::new(new_passphrase.to_string());
        let key = self
            .with_conn(move |conn| {
                let key = DerivedKey::derive(&passphrase, &params).map_err(StoreError::encrypting)?;
                let sealed = VaultParams::seal(&key).map_err(StoreError::encrypting)?;
                let tx = conn.transaction()?;
                vault::replace_vault(&tx, &sealed)?;
                tx.commit()?;
                Ok(key)
            })
            .await?;
        self.keys.set_key(key);
        tracing::info!("passphrase changed");
        Ok(old)
    }

    // --- recordings -----------------------------------------------------

    /// Validate, seal and upsert a recording. Returns its id.
    pub async fn put_recording(&self, recording: &Recording) -> StoreResult<String> {
        recording.validate()?;
        let key = self.write_key()?;
        let _turn = self.queue.acquire(Table::Recordings, &recording.id).await;

        let owned = recording.clone();
        self.with_conn(move |conn| recordings::upsert_recording(conn, &owned, &key))
            .await?;
        self.bus
            .publish(ChangeEvent::local(Table::Recordings, &recording.id, ChangeKind::Put));
        tracing::debug!(id = %recording.id, media = %recording.media_type, "recording stored");
        Ok(recording.id.clone())
    }

    /// `Ok(None)` if absent; `Decryption` if the key is missing or wrong.
    pub async fn get_recording(&self, id: &str) -> StoreResult<Option<Recording>> {
        let key = self.read_key()?;
        let id = id.to_string();
        self.with_conn(move |conn| recordings::fetch_recording(conn, &id, &key))
            .await
    }

    pub async fn query_recordings(&self, query: &RecordingQuery) -> StoreResult<Vec<Recording>> {
        self.fetch_live(query.clone()).await
    }

    /// Idempotent. Returns whether a row was removed.
    pub async fn delete_recording(&self, id: &str) -> StoreResult<bool> {
        let _turn = self.queue.acquire(Table::Recordings, id).await;
        let owned = id.to_string();
        let removed = self
            .with_conn(move |conn| recordings::delete_recording(conn, &owned))
            .await?;
        if removed {
            self.bus
                .publish(ChangeEvent::local(Table::Recordings, id, ChangeKind::Delete));
            tracing::debug!(id, "recording deleted");
        }
        Ok(removed)
    }

    pub async fn attach_transcription(&self, id: &str, text: &str) -> StoreResult<Recording> {
        let key = self.write_key()?;
        let _turn = self.queue.acquire(Table::Recordings, id).await;
        let (owned_id, text) = (id.to_string(), text.to_string());
        let recording = self
            .with_conn(move |conn| recordings::attach_transcription(conn, &owned_id, &text, &key))
            .await?;
        self.bus
            .publish(ChangeEvent::local(Table::Recordings, id, ChangeKind::Put));
        tracing::debug!(id, "transcription attached");
        Ok(recording)
    }

    /// Re-seal one recording from `old_key` to the active key.
    pub async fn reencrypt_recording(&self, id: &str, old_key: Arc<DerivedKey>) -> StoreResult<bool> {
        let new_key = self.write_key()?;
        let _turn = self.queue.acquire(Table::Recordings, id).await;
        let owned = id.to_string();
        let changed = self
            .with_conn(move |conn| recordings::reencrypt_recording(conn, &owned, &old_key, &new_key))
            .await?;
        if changed {
            self.bus
                .publish(ChangeEvent::local(Table::Recordings, id, ChangeKind::Put));
        }
        Ok(changed)
    }

    /// Plaintext listing; works while locked.
    pub async fn recording_summaries(&self) -> StoreResult<Vec<RecordingSummary>> {
        self.with_conn(|conn| recordings::recording_summaries(conn)).await
    }

    pub async fn recording_ids(&self) -> StoreResult<Vec<String>> {
        self.with_conn(|conn| recordings::recording_ids(conn)).await
    }

    // --- journal entries ------------------------------------------------

    pub async fn put_entry(&self, entry: &JournalEntry) -> StoreResult<String> {
        entry.validate()?;
        let key = self.write_key()?;
        let _turn = self.queue.acquire(Table::JournalEntries, &entry.id).await;

        let owned = entry.clone();
        self.with_conn(move |conn| entries::upsert_entry(conn, &owned, &key))
            .await?;
        self.bus
            .publish(ChangeEvent::local(Table::JournalEntries, &entry.id, ChangeKind::Put));
        tracing::debug!(id = %entry.id, date = %entry.entry_date, "journal entry stored");
        Ok(entry.id.clone())
    }

    pub async fn get_entry(&self, id: &str) -> StoreResult<Option<JournalEntry>> {
        let key = self.read_key()?;
        let id = id.to_string();
        self.with_conn(move |conn| entries::fetch_entry(conn, &id, &key))
            .await
    }

    pub async fn query_entries(&self, query: &EntryQuery) -> StoreResult<Vec<JournalEntry>> {
        self.fetch_live(query.clone()).await
    }

    pub async fn delete_entry(&self, id: &str) -> StoreResult<bool> {
        let _turn = self.queue.acquire(Table::JournalEntries, id).await;
        let owned = id.to_string();
        let removed = self
            .with_conn(move |conn| entries::delete_entry(conn, &owned))
            .await?;
        if removed {
            self.bus
                .publish(ChangeEvent::local(Table::JournalEntries, id, ChangeKind::Delete));
            tracing::debug!(id, "journal entry deleted");
        }
        Ok(removed)
    }

    pub async fn reencrypt_entry(&self, id: &str, old_key: Arc<DerivedKey>) -> StoreResult<bool> {
        let new_key = self.write_key()?;
        let _turn = self.queue.acquire(Table::JournalEntries, id).await;
        let owned = id.to_string();
        let changed = self
            .with_conn(move |conn| entries::reencrypt_entry(conn, &owned, &old_key, &new_key))
            .await?;
        if changed {
            self.bus
                .publish(ChangeEvent::local(Table::JournalEntries, id, ChangeKind::Put));
        }
        Ok(changed)
    }

    pub async fn entry_summaries(&self) -> StoreResult<Vec<EntrySummary>> {
        self.with_conn(|conn| entries::entry_summaries(conn)).await
    }

    pub async fn entry_ids(&self) -> StoreResult<Vec<String>> {
        self.with_conn(|conn| entries::entry_ids(conn)).await
    }

    /// Re-seal every recording and entry still sealed under `old_key`.
    ///
    /// Rows `old_key` cannot open are listed in the report and skipped.
    pub async fn reencrypt_all(&self, old_key: Arc<DerivedKey>) -> StoreResult<ReencryptReport> {
        let mut report = ReencryptReport::default();
        for id in self.recording_ids().await? {
            self.reencrypt_one(Table::Recordings, &id, Arc::clone(&old_key), &mut report)
                .await?;
        }
        for id in self.entry_ids().await? {
            self.reencrypt_one(Table::JournalEntries, &id, Arc::clone(&old_key), &mut report)
                .await?;
        }
        self.finish_reencryption(&report).await?;
        Ok(report)
    }

    /// Resume an interrupted passphrase change.
    ///
    /// Every row sealed outside the active vault is opened with a key derived
    /// from `old_passphrase` and that row's own KDF parameters, then re-sealed
    /// under the active key. Needs the store unlocked with the new passphrase.
    pub async fn reencrypt_with_passphrase(&self, old_passphrase: &str) -> StoreResult<ReencryptReport> {
        let salt = self.write_key()?.kdf().salt.clone();
        let (recording_ids, entry_ids) = self
            .with_conn(move |conn| vault::sealed_outside(conn, &salt))
            .await?;

        let passphrase = Zeroizing::new(old_passphrase.to_string());
        let mut keys: HashMap<String, Arc<DerivedKey>> = HashMap::new();
        let mut report = ReencryptReport::default();
        let work = recording_ids
            .into_iter()
            .map(|id| (Table::Recordings, id))
            .chain(entry_ids.into_iter().map(|id| (Table::JournalEntries, id)));
        for (table, id) in work {
            let Some(kdf) = self.sealed_kdf(table, &id).await? else {
                continue;
            };
            let old_key = match keys.get(&kdf.salt) {
                Some(key) => Arc::clone(key),
                None => match derive_blocking(passphrase.clone(), kdf.clone()).await {
                    Ok(key) => {
                        let key = Arc::new(key);
                        keys.insert(kdf.salt, Arc::clone(&key));
                        key
                    }
                    Err(err) => {
                        tracing::warn!(table = %table, id = %id, error = %err, "cannot derive the old key");
                        report.failed.push(id);
                        continue;
                    }
                },
            };
            self.reencrypt_one(table, &id, old_key, &mut report).await?;
        }
        self.finish_reencryption(&report).await?;
        Ok(report)
    }

    /// Rows sealed outside the active vault. Works while locked.
    pub async fn pending_reencryption(&self) -> StoreResult<u64> {
        self.with_conn(|conn| match vault::load_vault(conn)? {
            Some(active) => vault::pending_reencryption(conn, &active.kdf.salt),
            None => Ok(0),
        })
        .await
    }

    async fn reencrypt_one(
        &self,
        table: Table,
        id: &str,
        old_key: Arc<DerivedKey>,
        report: &mut ReencryptReport,
    ) -> StoreResult<()> {
        let result = match table {
            Table::Recordings => self.reencrypt_recording(id, old_key).await,
            _ => self.reencrypt_entry(id, old_key).await,
        };
        match result {
            Ok(true) if table == Table::Recordings => report.recordings += 1,
            Ok(true) => report.entries += 1,
            Ok(false) => {}
            Err(StoreError::Decryption(reason)) => {
                tracing::warn!(table = %table, id, reason = %reason, "row left under its old key");
                report.failed.push(id.to_string());
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// KDF parameters the row's content is sealed under.
    async fn sealed_kdf(&self, table: Table, id: &str) -> StoreResult<Option<KdfParams>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            Ok(match table {
                Table::Recordings => recordings::fetch_stored(conn, &id)?.map(|s| s.content.meta.kdf),
                _ => entries::fetch_stored(conn, &id)?.map(|s| s.body.meta.kdf),
            })
        })
        .await
    }

    /// Drop the previous vault once nothing is sealed outside the active one.
    async fn finish_reencryption(&self, report: &ReencryptReport) -> StoreResult<()> {
        let salt = self.write_key()?.kdf().salt.clone();
        let remaining = self
            .with_conn(move |conn| {
                let remaining = vault::pending_reencryption(conn, &salt)?;
                if remaining == 0 && vault::previous_vault(conn)?.is_some() {
                    vault::clear_previous_vault(conn)?;
                }
                Ok(remaining)
            })
            .await?;
        tracing::info!(
            recordings = report.recordings,
            entries = report.entries,
            failed = report.failed.len(),
            remaining,
            "re-encryption pass finished"
        );
        Ok(())
    }

    // --- reactive queries -----------------------------------------------

    /// Long-lived subscription to `query`. See [`LiveQuery`].
    pub fn watch<Q: LiveSource>(&self, query: Q) -> LiveQuery<Q> {
        LiveQuery::new(query, self.clone())
    }

    pub(crate) async fn fetch_live<Q: LiveSource>(&self, query: Q) -> StoreResult<Vec<Q::Item>> {
        let key = self.read_key()?;
        self.with_conn(move |conn| query.fetch(conn, &key)).await
    }

    // --- questions ------------------------------------------------------

    /// Insert catalog questions that are not stored yet.
    pub async fn seed_questions(&self, catalog: Vec<(Question, QuestionSource)>) -> StoreResult<usize> {
        let inserted = self
            .with_conn(move |conn| questions::seed_questions(conn, &catalog))
            .await?;
        if inserted > 0 {
            tracing::info!(inserted, "question catalog seeded");
        }
        Ok(inserted)
    }

    pub async fn question(&self, id: &str) -> StoreResult<Option<Question>> {
        let id = id.to_string();
        self.with_conn(move |conn| questions::fetch_question(conn, &id))
            .await
    }

    pub async fn questions(&self, category: Option<QuestionCategory>) -> StoreResult<Vec<Question>> {
        self.with_conn(move |conn| questions::list_questions(conn, category))
            .await
    }

    pub async fn resolve_question(&self, id: &str) -> StoreResult<QuestionRef> {
        let id = id.to_string();
        self.with_conn(move |conn| questions::resolve_question(conn, &id))
            .await
    }

    // --- settings -------------------------------------------------------

    pub async fn load_settings(&self) -> StoreResult<UserSettings> {
        self.with_conn(|conn| settings::load_settings(conn)).await
    }

    pub async fn save_settings(&self, next: &UserSettings) -> StoreResult<()> {
        let _turn = self.queue.acquire(Table::UserSettings, settings::SETTINGS_ID).await;
        let owned = next.clone();
        self.with_conn(move |conn| settings::save_settings(conn, &owned))
            .await?;
        self.bus.publish(ChangeEvent::local(
            Table::UserSettings,
            settings::SETTINGS_ID,
            ChangeKind::Put,
        ));
        Ok(())
    }

    // --- sync bookkeeping -----------------------------------------------

    pub async fn pending_mutations(&self, limit: usize) -> StoreResult<Vec<SyncMutation>> {
        self.with_conn(move |conn| outbox::pending(conn, limit)).await
    }

    pub async fn pending_count(&self) -> StoreResult<u64> {
        self.with_conn(|conn| outbox::pending_count(conn)).await
    }

    /// Drop outbox rows up to and including `seq`.
    pub async fn acknowledge(&self, seq: i64) -> StoreResult<usize> {
        self.with_conn(move |conn| outbox::acknowledge(conn, seq)).await
    }

    pub async fn sync_cursor(&self) -> StoreResult<Option<String>> {
        self.with_conn(|conn| Ok(migrations::get_meta(conn, migrations::SYNC_CURSOR_KEY)?))
            .await
    }

    pub async fn set_sync_cursor(&self, cursor: &str) -> StoreResult<()> {
        let cursor = cursor.to_string();
        self.with_conn(move |conn| {
            Ok(migrations::set_meta(conn, migrations::SYNC_CURSOR_KEY, &cursor)?)
        })
        .await
    }

    pub async fn last_synced_at(&self) -> StoreResult<Option<DateTime<Utc>>> {
        self.with_conn(|conn| {
            Ok(migrations::get_meta(conn, migrations::LAST_SYNC_KEY)?
                .and_then(|raw| db::parse_timestamp(&raw).ok()))
        })
        .await
    }

    pub async fn mark_synced(&self, at: DateTime<Utc>) -> StoreResult<()> {
        self.with_conn(move |conn| {
            Ok(migrations::set_meta(
                conn,
                migrations::LAST_SYNC_KEY,
                &db::format_timestamp(&at),
            )?)
        })
        .await
    }

    /// Apply a pulled change (last-writer-wins). Publishes a remote change
    /// event if local state changed.
    pub async fn apply_remote(&self, change: RemoteChange) -> StoreResult<bool> {
        let _turn = self.queue.acquire(change.table, &change.entity_id).await;
        let (table, id, kind) = (change.table, change.entity_id.clone(), change.operation);
        let applied = self
            .with_conn(move |conn| remote::apply_remote(conn, &change))
            .await?;
        if applied {
            self.bus.publish(ChangeEvent::remote(table, &id, kind));
            tracing::debug!(table = %table, id = %id, operation = kind.as_str(), "remote change applied");
        }
        Ok(applied)
    }

    // --- maintenance ----------------------------------------------------

    pub async fn stats(&self) -> StoreResult<StatsResponse> {
        let path = self.db_path.clone();
        self.with_conn(move |conn| stats::journal_stats(conn, path.as_deref()))
            .await
    }

    pub async fn health(&self) -> StoreResult<HealthReport> {
        self.with_conn(|conn| Ok(db::check_database_health(conn)?))
            .await
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("db_path", &self.db_path)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// Argon2id on the blocking pool.
async fn derive_blocking(passphrase: Zeroizing<String>, kdf: KdfParams) -> StoreResult<DerivedKey> {
    tokio::task::spawn_blocking(move || DerivedKey::derive(&passphrase, &kdf))
        .await
        .map_err(|e| StoreError::Task(format!("key derivation task failed: {e}")))?
        .map_err(StoreError::encrypting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::MediaType;

    fn fast() -> EncryptionConfig {
        EncryptionConfig {
            argon2_memory_kib: 64,
            argon2_iterations: 1,
            argon2_parallelism: 1,
        }
    }

    #[tokio::test]
    async fn unlock_rejects_wrong_passphrase() {
        let store = LocalStore::open_in_memory(fast()).unwrap();
        store.unlock("correct horse").await.unwrap();
        store.lock();

        let err = store.unlock("battery staple").await.unwrap_err();
        assert!(matches!(err, StoreError::Decryption(_)));
        assert!(!store.is_unlocked());

        store.unlock("correct horse").await.unwrap();
        assert!(store.is_unlocked());
    }

    #[tokio::test]
    async fn queued_puts_on_one_id_apply_in_order() {
        let store = LocalStore::open_in_memory(fast()).unwrap();
        store.unlock("pw").await.unwrap();

        let first = Recording::new(MediaType::Text, "first").with_id("r1");
        let second = Recording::new(MediaType::Text, "second").with_id("r1");
        let (a, b) = tokio::join!(store.put_recording(&first), store.put_recording(&second));
        a.unwrap();
        b.unwrap();

        let stored = store.get_recording("r1").await.unwrap().unwrap();
        assert_eq!(stored.content, "second");
        assert_eq!(store.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn write_queue_forgets_idle_slots() {
        let queue = WriteQueue::default();
        drop(queue.acquire(Table::Recordings, "a").await);
        let _held = queue.acquire(Table::Recordings, "b").await;
        let slots = queue.slots.lock().unwrap();
        assert_eq!(slots.len(), 1);
        assert!(slots.contains_key("recordings:b"));
    }
}
