use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ErrorKind, StoreError};
use crate::store::types::{EntrySummary, QuestionCategory, RecordingSummary, UserSettings};

/// Connection state of the optional sync backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SyncStatus {
    /// No endpoint configured, or the user turned sync off.
    #[default]
    Disabled,
    Idle,
    Syncing,
    /// Last attempt failed; local data is unaffected.
    Offline(String),
}

/// A user-visible error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&StoreError> for UiError {
    fn from(err: &StoreError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Progress counters derived from the recording and entry summaries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub answered_questions: BTreeSet<String>,
    pub recording_count: usize,
    pub entry_count: usize,
    /// Recordings per category of the question they answer.
    pub by_category: BTreeMap<QuestionCategory, usize>,
}

impl Progress {
    pub fn from_summaries(recordings: &[RecordingSummary], entries: &[EntrySummary]) -> Self {
        let mut progress = Self {
            recording_count: recordings.len(),
            entry_count: entries.len(),
            ..Self::default()
        };
        for r in recordings {
            if let Some(qid) = &r.question_id {
                progress.answered_questions.insert(qid.clone());
            }
            if let Some(category) = r.category {
                *progress.by_category.entry(category).or_insert(0) += 1;
            }
        }
        progress
    }
}

/// Everything the UI renders from. Replaced wholesale on every transition.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AppState {
    pub settings: UserSettings,
    pub progress: Progress,
    /// Newest first.
    pub recordings: Vec<RecordingSummary>,
    /// Most recent date first.
    pub entries: Vec<EntrySummary>,
    pub sync: SyncStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub error: Option<UiError>,
}

impl AppState {
    pub fn recording(&self, id: &str) -> Option<&RecordingSummary> {
        self.recordings.iter().find(|r| r.id == id)
    }

    pub fn has_answered(&self, question_id: &str) -> bool {
        self.progress.answered_questions.contains(question_id)
    }
}
