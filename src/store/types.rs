//! Entity type definitions.
//!
//! Defines [`Question`] and its [`QuestionCategory`], [`Recording`] with its
//! [`MediaType`] and [`PrivacyLevel`], [`JournalEntry`], and the singleton
//! [`UserSettings`] with its [`Setting`] updates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Prompt text used when a recording points at a question the catalog no longer has.
pub const UNKNOWN_QUESTION: &str = "unknown question";

macro_rules! string_enum {
    ($name:ident, $what:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            /// SQL-compatible string representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("unknown ", $what, ": {}"), s)),
                }
            }
        }
    };
}

/// Themes the reflective questions are grouped under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Childhood,
    Family,
    Relationships,
    Career,
    Values,
    Reflection,
    Gratitude,
    Dreams,
}

string_enum!(QuestionCategory, "question category", {
    Childhood => "childhood",
    Family => "family",
    Relationships => "relationships",
    Career => "career",
    Values => "values",
    Reflection => "reflection",
    Gratitude => "gratitude",
    Dreams => "dreams",
});

/// How a recording was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Text,
    Voice,
    Photo,
    Video,
}

string_enum!(MediaType, "media type", {
    Text => "text",
    Voice => "voice",
    Photo => "photo",
    Video => "video",
});

impl MediaType {
    /// Voice and video carry a duration; text and photo do not.
    pub fn is_timed(&self) -> bool {
        matches!(self, Self::Voice | Self::Video)
    }
}

/// Who may eventually see an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    #[default]
    Private,
    Trusted,
    Family,
    Public,
}

string_enum!(PrivacyLevel, "privacy level", {
    Private => "private",
    Trusted => "trusted",
    Family => "family",
    Public => "public",
});

/// A reflective question. Immutable once defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub category: QuestionCategory,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Result of looking up a recording's question. Dangling ids resolve to `Unknown`.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionRef {
    Known(Question),
    Unknown(String),
}

impl QuestionRef {
    pub fn prompt(&self) -> &str {
        match self {
            Self::Known(q) => &q.prompt,
            Self::Unknown(_) => UNKNOWN_QUESTION,
        }
    }

    pub fn category(&self) -> Option<QuestionCategory> {
        match self {
            Self::Known(q) => Some(q.category),
            Self::Unknown(_) => None,
        }
    }
}

/// A captured voice/text/photo/video journal item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// UUID v7 (time-sortable) primary key, or any caller-chosen id.
    pub id: String,
    /// Weak reference into the question catalog.
    pub question_id: Option<String>,
    pub media_type: MediaType,
    /// Text body for `Text`, otherwise a reference to the captured media. Encrypted at rest.
    pub content: String,
    /// Attached after capture. Encrypted at rest.
    pub transcription: Option<String>,
    pub duration_secs: Option<f64>,
    pub privacy: PrivacyLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recording {
    /// New recording with a UUID v7 id, private by default.
    pub fn new(media_type: MediaType, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            question_id: None,
            media_type,
            content: content.into(),
            transcription: None,
            duration_secs: None,
            privacy: PrivacyLevel::Private,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn answering(mut self, question_id: impl Into<String>) -> Self {
        self.question_id = Some(question_id.into());
        self
    }

    pub fn with_privacy(mut self, privacy: PrivacyLevel) -> Self {
        self.privacy = privacy;
        self
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }
}

/// A free-form dated journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub entry_date: NaiveDate,
    /// Encrypted at rest.
    pub body: String,
    pub mood: Option<String>,
    pub tags: Vec<String>,
    pub privacy: PrivacyLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(entry_date: NaiveDate, body: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            entry_date,
            body: body.into(),
            mood: None,
            tags: Vec::new(),
            privacy: PrivacyLevel::Private,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }
}

/// Plaintext projection of a recording. Readable while the store is locked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub id: String,
    pub question_id: Option<String>,
    /// Category of the answered question; `None` if unlinked or the question is gone.
    pub category: Option<QuestionCategory>,
    pub media_type: MediaType,
    pub privacy: PrivacyLevel,
    pub has_transcription: bool,
    pub created_at: DateTime<Utc>,
}

impl RecordingSummary {
    pub fn of(recording: &Recording, category: Option<QuestionCategory>) -> Self {
        Self {
            id: recording.id.clone(),
            question_id: recording.question_id.clone(),
            category,
            media_type: recording.media_type,
            privacy: recording.privacy,
            has_transcription: recording.transcription.is_some(),
            created_at: recording.created_at,
        }
    }
}

/// Plaintext projection of a journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub id: String,
    pub entry_date: NaiveDate,
    pub mood: Option<String>,
    pub tags: Vec<String>,
}

impl EntrySummary {
    pub fn of(entry: &JournalEntry) -> Self {
        Self {
            id: entry.id.clone(),
            entry_date: entry.entry_date,
            mood: entry.mood.clone(),
            tags: entry.tags.clone(),
        }
    }
}

/// Per-user configuration. One row per database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub default_privacy: PrivacyLevel,
    /// Insight providers the user opted into.
    pub enabled_providers: Vec<String>,
    pub sync_enabled: bool,
    pub auto_transcribe: bool,
    pub daily_prompt_enabled: bool,
}

/// Settings written on first run.
pub const DEFAULT_SETTINGS: UserSettings = UserSettings {
    default_privacy: PrivacyLevel::Private,
    enabled_providers: Vec::new(),
    sync_enabled: true,
    auto_transcribe: false,
    daily_prompt_enabled: true,
};

impl Default for UserSettings {
    fn default() -> Self {
        DEFAULT_SETTINGS
    }
}

/// A single settings change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "camelCase")]
pub enum Setting {
    DefaultPrivacy(PrivacyLevel),
    EnabledProviders(Vec<String>),
    SyncEnabled(bool),
    AutoTranscribe(bool),
    DailyPromptEnabled(bool),
}

impl Setting {
    /// Parse a `key`/`value` pair as typed on the command line.
    /// Keys accept both `syncEnabled` and `sync_enabled` spellings.
    pub fn parse(key: &str, value: &str) -> Result<Self, StoreError> {
        let flag = || -> Result<bool, StoreError> {
            match value.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => Ok(true),
                "false" | "off" | "no" | "0" => Ok(false),
                other => Err(StoreError::Validation(format!(
                    "{key} expects a boolean, got {other:?}"
                ))),
            }
        };

        match key.replace('_', "").to_ascii_lowercase().as_str() {
            "defaultprivacy" => value
                .trim()
                .parse()
                .map(Self::DefaultPrivacy)
                .map_err(StoreError::Validation),
            "enabledproviders" => Ok(Self::EnabledProviders(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            )),
            "syncenabled" => flag().map(Self::SyncEnabled),
            "autotranscribe" => flag().map(Self::AutoTranscribe),
            "dailypromptenabled" => flag().map(Self::DailyPromptEnabled),
            _ => Err(StoreError::Validation(format!("unknown setting: {key}"))),
        }
    }
}

impl UserSettings {
    /// Copy of these settings with one change applied.
    pub fn with(&self, setting: &Setting) -> Self {
        let mut next = self.clone();
        match setting {
            Setting::DefaultPrivacy(p) => next.default_privacy = *p,
            Setting::EnabledProviders(list) => next.enabled_providers = list.clone(),
            Setting::SyncEnabled(on) => next.sync_enabled = *on,
            Setting::AutoTranscribe(on) => next.auto_transcribe = *on,
            Setting::DailyPromptEnabled(on) => next.daily_prompt_enabled = *on,
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_roundtrip_through_strings() {
        for c in QuestionCategory::ALL {
            assert_eq!(c.as_str().parse::<QuestionCategory>().unwrap(), *c);
        }
        for m in MediaType::ALL {
            assert_eq!(m.to_string().parse::<MediaType>().unwrap(), *m);
        }
        assert!("hologram".parse::<MediaType>().is_err());
    }

    #[test]
    fn unknown_question_prompt() {
        let r = QuestionRef::Unknown("gone-42".into());
        assert_eq!(r.prompt(), UNKNOWN_QUESTION);
        assert_eq!(r.category(), None);
    }

    #[test]
    fn setting_parse_accepts_both_spellings() {
        assert_eq!(
            Setting::parse("syncEnabled", "false").unwrap(),
            Setting::SyncEnabled(false)
        );
        assert_eq!(
            Setting::parse("sync_enabled", "on").unwrap(),
            Setting::SyncEnabled(true)
        );
        assert_eq!(
            Setting::parse("enabled_providers", "local, openai,").unwrap(),
            Setting::EnabledProviders(vec!["local".into(), "openai".into()])
        );
        assert!(Setting::parse("syncEnabled", "maybe").is_err());
        assert!(Setting::parse("colour", "blue").is_err());
    }

    #[test]
    fn setting_serializes_like_an_action_payload() {
        let json = serde_json::to_value(Setting::SyncEnabled(false)).unwrap();
        assert_eq!(json, serde_json::json!({"key": "syncEnabled", "value": false}));
    }

    #[test]
    fn with_leaves_original_untouched() {
        let base = UserSettings::default();
        let next = base.with(&Setting::SyncEnabled(false));
        assert!(base.sync_enabled);
        assert!(!next.sync_enabled);
    }
}
