//! Actions and the pure transition function.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{AppState, Progress, SyncStatus, UiError};
use crate::store::types::{EntrySummary, RecordingSummary, Setting, UserSettings};

/// Serialized flat: the `type` tag sits beside the payload's own fields, e.g.
/// `{"type":"SET_SETTING","key":"syncEnabled","value":false}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// One setting changed (already persisted).
    SetSetting(Setting),
    ReplaceSettings(UserSettings),
    /// Load everything read from the local store at startup.
    Hydrate {
        settings: UserSettings,
        recordings: Vec<RecordingSummary>,
        entries: Vec<EntrySummary>,
        last_synced_at: Option<DateTime<Utc>>,
    },
    RecordingSaved(RecordingSummary),
    /// Replace the summary of an existing recording (e.g. transcription attached).
    RecordingUpdated(RecordingSummary),
    RecordingDeleted { id: String },
    EntrySaved(EntrySummary),
    EntryDeleted { id: String },
    SyncStatusChanged(SyncStatus),
    SyncCompleted { at: DateTime<Utc> },
    ErrorRaised(UiError),
    ErrorCleared,
    /// Back to the initial state.
    Reset,
}

/// Compute the next state. Never mutates `state`; the result shares nothing
/// mutable with it.
pub fn reduce(state: &AppState, action: &Action) -> AppState {
    let mut next = state.clone();
    match action {
        Action::SetSetting(setting) => {
            next.settings = state.settings.with(setting);
            apply_sync_toggle(&mut next);
        }
        Action::ReplaceSettings(settings) => {
            next.settings = settings.clone();
            apply_sync_toggle(&mut next);
        }
        Action::Hydrate {
            settings,
            recordings,
            entries,
            last_synced_at,
        } => {
            next.settings = settings.clone();
            next.recordings = recordings.clone();
            next.entries = entries.clone();
            next.last_synced_at = *last_synced_at;
            next.error = None;
            apply_sync_toggle(&mut next);
            refresh_progress(&mut next);
        }
        Action::RecordingSaved(summary) | Action::RecordingUpdated(summary) => {
            next.recordings.retain(|r| r.id != summary.id);
            let at = next
                .recordings
                .iter()
                .position(|r| r.created_at < summary.created_at)
                .unwrap_or(next.recordings.len());
            next.recordings.insert(at, summary.clone());
            refresh_progress(&mut next);
        }
        Action::RecordingDeleted { id } => {
            next.recordings.retain(|r| &r.id != id);
            refresh_progress(&mut next);
        }
        Action::EntrySaved(summary) => {
            next.entries.retain(|e| e.id != summary.id);
            let at = next
                .entries
                .iter()
                .position(|e| e.entry_date < summary.entry_date)
                .unwrap_or(next.entries.len());
            next.entries.insert(at, summary.clone());
            refresh_progress(&mut next);
        }
        Action::EntryDeleted { id } => {
            next.entries.retain(|e| &e.id != id);
            refresh_progress(&mut next);
        }
        Action::SyncStatusChanged(status) => {
            next.sync = if next.settings.sync_enabled {
                status.clone()
            } else {
                SyncStatus::Disabled
            };
        }
        Action::SyncCompleted { at } => {
            next.last_synced_at = Some(*at);
            if next.settings.sync_enabled {
                next.sync = SyncStatus::Idle;
            }
        }
        Action::ErrorRaised(err) => next.error = Some(err.clone()),
        Action::ErrorCleared => next.error = None,
        Action::Reset => next = AppState::default(),
    }
    next
}

/// Turning sync off pins the status to `Disabled`. Turning it on leaves the
/// status alone: only the app knows whether a backend is configured.
fn apply_sync_toggle(state: &mut AppState) {
    if !state.settings.sync_enabled {
        state.sync = SyncStatus::Disabled;
    }
}

fn refresh_progress(state: &mut AppState) {
    state.progress = Progress::from_summaries(&state.recordings, &state.entries);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{MediaType, PrivacyLevel, QuestionCategory};
    use chrono::TimeZone;

    fn summary(id: &str, secs: i64, question: Option<&str>) -> RecordingSummary {
        RecordingSummary {
            id: id.into(),
            question_id: question.map(String::from),
            category: question.map(|_| QuestionCategory::Family),
            media_type: MediaType::Voice,
            privacy: PrivacyLevel::Private,
            has_transcription: false,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn reduce_does_not_touch_the_input() {
        let before = AppState::default();
        let after = reduce(&before, &Action::SetSetting(Setting::SyncEnabled(false)));
        assert!(before.settings.sync_enabled);
        assert!(!after.settings.sync_enabled);
        assert_eq!(after.sync, SyncStatus::Disabled);
    }

    #[test]
    fn recordings_stay_newest_first() {
        let mut state = AppState::default();
        for (id, secs) in [("b", 20), ("a", 10), ("c", 30)] {
            state = reduce(&state, &Action::RecordingSaved(summary(id, secs, Some("q1"))));
        }
        let ids: Vec<_> = state.recordings.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
        assert_eq!(state.progress.recording_count, 3);
        assert_eq!(state.progress.answered_questions.len(), 1);
        assert_eq!(state.progress.by_category[&QuestionCategory::Family], 3);
    }

    #[test]
    fn saving_twice_replaces() {
        let state = reduce(&AppState::default(), &Action::RecordingSaved(summary("a", 10, None)));
        let mut updated = summary("a", 10, None);
        updated.has_transcription = true;
        let state = reduce(&state, &Action::RecordingUpdated(updated));
        assert_eq!(state.recordings.len(), 1);
        assert!(state.recordings[0].has_transcription);
    }

    #[test]
    fn sync_status_is_pinned_while_disabled() {
        let state = reduce(&AppState::default(), &Action::SetSetting(Setting::SyncEnabled(false)));
        let state = reduce(&state, &Action::SyncStatusChanged(SyncStatus::Syncing));
        assert_eq!(state.sync, SyncStatus::Disabled);

        let state = reduce(&state, &Action::SetSetting(Setting::SyncEnabled(true)));
        assert_eq!(state.sync, SyncStatus::Disabled);
        let state = reduce(&state, &Action::SyncStatusChanged(SyncStatus::Idle));
        assert_eq!(state.sync, SyncStatus::Idle);
    }

    #[test]
    fn action_json_shape() {
        let json = serde_json::to_value(Action::SetSetting(Setting::SyncEnabled(false))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "SET_SETTING", "key": "syncEnabled", "value": false})
        );
        let json = serde_json::to_value(Action::RecordingDeleted { id: "r1".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "RECORDING_DELETED", "id": "r1"}));
        let json = serde_json::to_value(Action::ErrorCleared).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ERROR_CLEARED"}));
    }

    #[test]
    fn flat_actions_parse() {
        let action: Action =
            serde_json::from_str(r#"{"type":"SET_SETTING","key":"syncEnabled","value":false}"#)
                .unwrap();
        assert_eq!(action, Action::SetSetting(Setting::SyncEnabled(false)));

        let action: Action =
            serde_json::from_str(r#"{"type":"SYNC_STATUS_CHANGED","status":"offline","reason":"timeout"}"#)
                .unwrap();
        assert_eq!(action, Action::SyncStatusChanged(SyncStatus::Offline("timeout".into())));

        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let json = serde_json::to_string(&Action::SyncCompleted { at }).unwrap();
        assert_eq!(serde_json::from_str::<Action>(&json).unwrap(), Action::SyncCompleted { at });

        assert!(serde_json::from_str::<Action>(r#"{"type":"SET_SETTING","key":"nope","value":1}"#).is_err());
    }

    #[test]
    fn reset_returns_to_default() {
        let state = reduce(&AppState::default(), &Action::RecordingDeleted { id: "x".into() });
        let state = reduce(&state, &Action::Reset);
        assert_eq!(state, AppState::default());
    }
}
