//! The application context.
//!
//! [`App`] is built once at startup and passed by reference to everything
//! that needs storage or state. It runs each user action against the
//! [`LocalStore`] first and dispatches to the [`StateStore`] only when the
//! store call succeeded, so a failure never leaves `AppState` half-updated.

use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{expand_tilde, LifelogConfig};
use crate::error::{StoreError, StoreResult};
use crate::state::{Action, AppState, StateStore, SyncStatus, UiError};
use crate::store::questions::{builtin_catalog, load_extended, merge_catalog};
use crate::store::types::{
    EntrySummary, JournalEntry, MediaType, QuestionRef, Recording, RecordingSummary, Setting,
    UserSettings,
};
use crate::store::LocalStore;
use crate::sync::engine::{sync_once, SyncReport};
use crate::sync::http::HttpSyncClient;
use crate::sync::{SyncClient, SyncError};

/// Why [`App::sync_now`] did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No endpoint configured.
    NotConfigured,
    /// The user turned sync off.
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Completed(SyncReport),
    /// The backend could not be reached or refused the request. Local data is untouched.
    Offline(String),
}

pub struct App {
    store: LocalStore,
    state: Arc<StateStore>,
    sync: Option<Arc<dyn SyncClient>>,
    batch_size: usize,
}

impl App {
    pub fn new(
        store: LocalStore,
        state: Arc<StateStore>,
        sync: Option<Arc<dyn SyncClient>>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            state,
            sync,
            batch_size,
        }
    }

    /// Open the store, seed the question catalog and set up sync from `config`.
    pub async fn open(config: &LifelogConfig) -> anyhow::Result<Self> {
        let store = LocalStore::open(config)?;

        let extended = match &config.questions.extended_path {
            Some(path) => load_extended(expand_tilde(path))?,
            None => Vec::new(),
        };
        store
            .seed_questions(merge_catalog(builtin_catalog(), extended))
            .await
            .context("failed to seed question catalog")?;

        let sync: Option<Arc<dyn SyncClient>> = match HttpSyncClient::from_config(&config.sync) {
            Ok(client) => {
                tracing::info!(endpoint = client.endpoint(), "sync enabled");
                Some(Arc::new(client))
            }
            Err(SyncError::NotConfigured) => {
                tracing::info!("no sync endpoint configured, running local-only");
                None
            }
            Err(e) => return Err(e).context("failed to set up sync client"),
        };

        Ok(Self::new(store, Arc::new(StateStore::new()), sync, config.sync.batch_size))
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    pub fn sync_configured(&self) -> bool {
        self.sync.is_some()
    }

    /// Surface a failed action in `AppState.error` and hand it back.
    fn report<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(err) = &result {
            tracing::warn!(error = %err, kind = ?err.kind(), "action failed");
            self.state.dispatch(Action::ErrorRaised(UiError::from(err)));
        }
        result
    }

    fn sync_status_for(&self, sync_enabled: bool) -> SyncStatus {
        if self.sync.is_some() && sync_enabled {
            SyncStatus::Idle
        } else {
            SyncStatus::Disabled
        }
    }

    /// Load settings and summaries from the store into `AppState`.
    pub async fn hydrate(&self) -> StoreResult<Arc<AppState>> {
        let loaded = self.load_snapshot().await;
        let (settings, recordings, entries, last_synced_at) = self.report(loaded)?;
        let status = self.sync_status_for(settings.sync_enabled);
        self.state.dispatch(Action::Hydrate {
            settings,
            recordings,
            entries,
            last_synced_at,
        });
        Ok(self.state.dispatch(Action::SyncStatusChanged(status)))
    }

    #[allow(clippy::type_complexity)]
    async fn load_snapshot(
        &self,
    ) -> StoreResult<(
        UserSettings,
        Vec<RecordingSummary>,
        Vec<EntrySummary>,
        Option<DateTime<Utc>>,
    )> {
        Ok((
            self.store.load_settings().await?,
            self.store.recording_summaries().await?,
            self.store.entry_summaries().await?,
            self.store.last_synced_at().await?,
        ))
    }

    /// Derive the session key. A device without a vault first fetches the
    /// shared one, so every device seals under the same salt.
    pub async fn unlock(&self, passphrase: &str) -> StoreResult<()> {
        let result: StoreResult<()> = async {
            self.adopt_shared_vault().await?;
            self.store.unlock(passphrase).await
        }
        .await;
        self.report(result)
    }

    async fn adopt_shared_vault(&self) -> StoreResult<()> {
        let Some(client) = &self.sync else {
            return Ok(());
        };
        if self.store.vault_params().await?.is_some() || !self.store.load_settings().await?.sync_enabled {
            return Ok(());
        }
        match client.pull_vault().await {
            Ok(Some(remote)) => {
                self.store.adopt_vault(remote).await?;
                tracing::info!("adopted the shared vault");
            }
            Ok(None) => tracing::debug!("no shared vault yet"),
            Err(err) => tracing::warn!(error = %err, "could not fetch the shared vault, creating a local one"),
        }
        Ok(())
    }

    pub fn lock(&self) {
        self.store.lock();
    }

    /// A new recording carrying the user's default privacy level.
    pub fn new_recording(&self, media_type: MediaType, content: impl Into<String>) -> Recording {
        Recording::new(media_type, content).with_privacy(self.state.get_state().settings.default_privacy)
    }

    pub async fn save_recording(&self, recording: &Recording) -> StoreResult<String> {
        let result: StoreResult<_> = async {
            let category = match &recording.question_id {
                Some(qid) => self.store.resolve_question(qid).await?.category(),
                None => None,
            };
            let id = self.store.put_recording(recording).await?;
            Ok((id, RecordingSummary::of(recording, category)))
        }
        .await;
        let (id, summary) = self.report(result)?;
        self.state.dispatch(Action::RecordingSaved(summary));
        Ok(id)
    }

    pub async fn attach_transcription(&self, id: &str, text: &str) -> StoreResult<Recording> {
        let result: StoreResult<_> = async {
            let recording = self.store.attach_transcription(id, text).await?;
            let category = match &recording.question_id {
                Some(qid) => self.store.resolve_question(qid).await?.category(),
                None => None,
            };
            Ok((recording, category))
        }
        .await;
        let (recording, category) = self.report(result)?;
        self.state
            .dispatch(Action::RecordingUpdated(RecordingSummary::of(&recording, category)));
        Ok(recording)
    }

    /// Idempotent; state changes only if something was deleted.
    pub async fn delete_recording(&self, id: &str) -> StoreResult<bool> {
        let result = self.store.delete_recording(id).await;
        let removed = self.report(result)?;
        if removed {
            self.state.dispatch(Action::RecordingDeleted { id: id.to_string() });
        }
        Ok(removed)
    }

    pub async fn save_entry(&self, entry: &JournalEntry) -> StoreResult<String> {
        let result = self.store.put_entry(entry).await;
        let id = self.report(result)?;
        self.state.dispatch(Action::EntrySaved(EntrySummary::of(entry)));
        Ok(id)
    }

    pub async fn delete_entry(&self, id: &str) -> StoreResult<bool> {
        let result = self.store.delete_entry(id).await;
        let removed = self.report(result)?;
        if removed {
            self.state.dispatch(Action::EntryDeleted { id: id.to_string() });
        }
        Ok(removed)
    }

    /// Persist one setting, then dispatch it.
    pub async fn set_setting(&self, setting: Setting) -> StoreResult<()> {
        let result: StoreResult<_> = async {
            let next = self.store.load_settings().await?.with(&setting);
            self.store.save_settings(&next).await
        }
        .await;
        self.report(result)?;
        self.state.dispatch(Action::SetSetting(setting.clone()));
        if setting == Setting::SyncEnabled(true) {
            self.state
                .dispatch(Action::SyncStatusChanged(self.sync_status_for(true)));
        }
        Ok(())
    }

    /// Look up a question; a dangling id resolves to [`QuestionRef::Unknown`].
    pub async fn resolve_question(&self, id: &str) -> StoreResult<QuestionRef> {
        let result = self.store.resolve_question(id).await;
        self.report(result)
    }

    /// Push and pull once. A no-op when sync is off or unconfigured.
    ///
    /// Backend failures are not errors: they flip the status to `Offline`.
    pub async fn sync_now(&self) -> StoreResult<SyncOutcome> {
        let Some(client) = &self.sync else {
            return Ok(SyncOutcome::Skipped(SkipReason::NotConfigured));
        };
        // The persisted settings decide, even before the first hydrate.
        let loaded = self.store.load_settings().await;
        let settings = self.report(loaded)?;
        if settings != self.state.get_state().settings {
            self.state.dispatch(Action::ReplaceSettings(settings.clone()));
        }
        if !settings.sync_enabled {
            tracing::debug!("sync skipped: disabled in settings");
            return Ok(SyncOutcome::Skipped(SkipReason::Disabled));
        }

        self.state.dispatch(Action::SyncStatusChanged(SyncStatus::Syncing));
        match sync_once(&self.store, client.as_ref(), self.batch_size).await {
            Ok(report) => {
                if report.applied > 0 || report.vault_adopted {
                    let loaded = self.load_snapshot().await;
                    let (settings, recordings, entries, _) = self.report(loaded)?;
                    self.state.dispatch(Action::Hydrate {
                        settings,
                        recordings,
                        entries,
                        last_synced_at: Some(report.synced_at),
                    });
                }
                self.state.dispatch(Action::SyncCompleted { at: report.synced_at });
                Ok(SyncOutcome::Completed(report))
            }
            Err(StoreError::Sync(err)) => {
                tracing::warn!(error = %err, "sync failed, staying local");
                let reason = err.to_string();
                self.state
                    .dispatch(Action::SyncStatusChanged(SyncStatus::Offline(reason.clone())));
                Ok(SyncOutcome::Offline(reason))
            }
            Err(err) => {
                self.state.dispatch(Action::SyncStatusChanged(SyncStatus::Idle));
                self.report(Err(err))
            }
        }
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("store", &self.store)
            .field("state", &self.state)
            .field("sync_configured", &self.sync.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
