//! Runtime validation at the storage boundary.
//!
//! The types already rule out most malformed data; these checks cover what
//! the type system cannot (empty strings, ranges, timestamp order) for input
//! arriving from outside the core.

use crate::error::{StoreError, StoreResult};

use super::types::{JournalEntry, MediaType, Question, Recording};

const MAX_ID_LEN: usize = 128;
const MAX_MOOD_LEN: usize = 64;
const MAX_TAG_LEN: usize = 64;

/// Types that can be checked before they reach SQLite.
pub trait Validate {
    fn validate(&self) -> StoreResult<()>;
}

/// Collects problems so the caller sees all of them at once.
#[derive(Default)]
struct Problems(Vec<String>);

impl Problems {
    fn check(&mut self, ok: bool, msg: impl Into<String>) {
        if !ok {
            self.0.push(msg.into());
        }
    }

    fn into_result(self, what: &str) -> StoreResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(format!("{what}: {}", self.0.join("; "))))
        }
    }
}

fn valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_LEN && !id.chars().any(char::is_whitespace)
}

impl Validate for Recording {
    fn validate(&self) -> StoreResult<()> {
        let mut p = Problems::default();
        p.check(valid_id(&self.id), "id must be 1-128 non-whitespace characters");
        if let Some(qid) = &self.question_id {
            p.check(valid_id(qid), "question_id must be a valid id when present");
        }
        p.check(!self.content.trim().is_empty(), "content must not be empty");
        if self.media_type != MediaType::Text {
            p.check(
                !self.content.contains(['\n', '\r']),
                "media content must be a single-line reference",
            );
        }
        if let Some(d) = self.duration_secs {
            p.check(
                self.media_type.is_timed(),
                format!("{} recordings have no duration", self.media_type),
            );
            p.check(d.is_finite() && d >= 0.0, "duration_secs must be finite and >= 0");
        }
        if let Some(t) = &self.transcription {
            p.check(!t.trim().is_empty(), "transcription must not be blank when present");
        }
        p.check(
            self.updated_at >= self.created_at,
            "updated_at must not precede created_at",
        );
        p.into_result("invalid recording")
    }
}

impl Validate for JournalEntry {
    fn validate(&self) -> StoreResult<()> {
        let mut p = Problems::default();
        p.check(valid_id(&self.id), "id must be 1-128 non-whitespace characters");
        p.check(!self.body.trim().is_empty(), "body must not be empty");
        if let Some(mood) = &self.mood {
            p.check(
                !mood.trim().is_empty() && mood.len() <= MAX_MOOD_LEN,
                "mood must be 1-64 characters when present",
            );
        }
        for tag in &self.tags {
            p.check(
                !tag.trim().is_empty() && tag.len() <= MAX_TAG_LEN,
                format!("tag {tag:?} must be 1-64 characters"),
            );
        }
        let mut seen = std::collections::HashSet::new();
        p.check(
            self.tags.iter().all(|t| seen.insert(t.as_str())),
            "tags must be unique",
        );
        p.check(
            self.updated_at >= self.created_at,
            "updated_at must not precede created_at",
        );
        p.into_result("invalid journal entry")
    }
}

impl Validate for Question {
    fn validate(&self) -> StoreResult<()> {
        let mut p = Problems::default();
        p.check(valid_id(&self.id), "id must be 1-128 non-whitespace characters");
        p.check(!self.prompt.trim().is_empty(), "prompt must not be empty");
        p.into_result("invalid question")
    }
}
