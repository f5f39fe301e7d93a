//! The question catalog.
//!
//! A built-in catalog ships with the binary; an optional TOML supplement of
//! "extended" questions is merged in at load time. Questions are immutable
//! once stored: seeding uses `INSERT OR IGNORE`.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::db::enum_column;
use crate::error::StoreResult;

use super::types::{Question, QuestionCategory, QuestionRef};
use super::validate::Validate;

/// Where a catalog question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    Builtin,
    Extended,
}

impl QuestionSource {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::Extended => "extended",
        }
    }
}

const BUILTIN: &[(&str, QuestionCategory, &str)] = &[
    ("childhood-home", QuestionCategory::Childhood, "Describe the home you grew up in. What room do you remember most?"),
    ("childhood-friend", QuestionCategory::Childhood, "Who was your closest friend as a child, and what did you do together?"),
    ("family-tradition", QuestionCategory::Family, "What family tradition would you most like to pass on?"),
    ("family-parent-lesson", QuestionCategory::Family, "What is the most important thing a parent taught you?"),
    ("relationships-first-meeting", QuestionCategory::Relationships, "How did you meet the people who matter most to you today?"),
    ("relationships-repair", QuestionCategory::Relationships, "Tell the story of a relationship you repaired."),
    ("career-first-job", QuestionCategory::Career, "What was your first job, and what did it teach you?"),
    ("career-proudest", QuestionCategory::Career, "What piece of work are you proudest of?"),
    ("values-changed-mind", QuestionCategory::Values, "What is something you changed your mind about later in life?"),
    ("values-principle", QuestionCategory::Values, "Which principle have you never compromised on?"),
    ("reflection-younger-self", QuestionCategory::Reflection, "What would you tell your twenty-year-old self?"),
    ("reflection-turning-point", QuestionCategory::Reflection, "Describe a turning point in your life."),
    ("gratitude-today", QuestionCategory::Gratitude, "What are you grateful for today?"),
    ("gratitude-unthanked", QuestionCategory::Gratitude, "Who deserves a thank-you they never received?"),
    ("dreams-unfinished", QuestionCategory::Dreams, "What dream have you not yet pursued?"),
    ("dreams-legacy", QuestionCategory::Dreams, "How do you hope to be remembered?"),
];

/// The catalog compiled into the binary.
pub fn builtin_catalog() -> Vec<Question> {
    BUILTIN
        .iter()
        .map(|(id, category, prompt)| Question {
            id: (*id).to_string(),
            category: *category,
            prompt: (*prompt).to_string(),
            metadata: None,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ExtendedFile {
    #[serde(default)]
    questions: Vec<Question>,
}

/// Parse an extended-questions TOML document:
///
/// ```toml
/// [[questions]]
/// id = "travel-first-trip"
/// category = "reflection"
/// prompt = "Where did you travel first?"
/// ```
pub fn parse_extended(toml_str: &str) -> Result<Vec<Question>> {
    let file: ExtendedFile = toml::from_str(toml_str).context("failed to parse extended questions")?;
    for q in &file.questions {
        q.validate()
            .with_context(|| format!("invalid extended question {:?}", q.id))?;
    }
    Ok(file.questions)
}

pub fn load_extended(path: impl AsRef<Path>) -> Result<Vec<Question>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_extended(&contents)
}

/// Merge the supplement into the built-in catalog. Built-in ids win; later
/// duplicates inside the supplement are dropped.
pub fn merge_catalog(
    builtin: Vec<Question>,
    extended: Vec<Question>,
) -> Vec<(Question, QuestionSource)> {
    let mut seen: HashSet<String> = builtin.iter().map(|q| q.id.clone()).collect();
    let mut merged: Vec<(Question, QuestionSource)> = builtin
        .into_iter()
        .map(|q| (q, QuestionSource::Builtin))
        .collect();

    for q in extended {
        if seen.insert(q.id.clone()) {
            merged.push((q, QuestionSource::Extended));
        } else {
            tracing::warn!(id = %q.id, "extended question shadows an existing id, ignoring");
        }
    }
    merged
}

/// Insert catalog questions that are not stored yet. Returns how many were new.
pub fn seed_questions(conn: &mut Connection, catalog: &[(Question, QuestionSource)]) -> StoreResult<usize> {
    let tx = conn.transaction()?;
    let mut inserted = 0;
    for (q, source) in catalog {
        q.validate()?;
        let metadata = q.metadata.as_ref().map(|m| m.to_string());
        inserted += tx.execute(
            "INSERT OR IGNORE INTO questions (id, category, prompt, metadata, source) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![q.id, q.category.as_str(), q.prompt, metadata, source.as_str()],
        )?;
    }
    tx.commit()?;
    Ok(inserted)
}

fn question_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Question> {
    let metadata: Option<String> = row.get(3)?;
    Ok(Question {
        id: row.get(0)?,
        category: enum_column(row, 1)?,
        prompt: row.get(2)?,
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
    })
}

pub fn fetch_question(conn: &Connection, id: &str) -> StoreResult<Option<Question>> {
    let q = conn
        .query_row(
            "SELECT id, category, prompt, metadata FROM questions WHERE id = ?1",
            params![id],
            question_from_row,
        )
        .optional()?;
    Ok(q)
}

pub fn list_questions(conn: &Connection, category: Option<QuestionCategory>) -> StoreResult<Vec<Question>> {
    let mut stmt = conn.prepare(
        "SELECT id, category, prompt, metadata FROM questions \
         WHERE ?1 IS NULL OR category = ?1 ORDER BY category, id",
    )?;
    let rows = stmt
        .query_map(params![category.map(|c| c.as_str())], question_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Look up a question; a dangling id is not an error.
pub fn resolve_question(conn: &Connection, id: &str) -> StoreResult<QuestionRef> {
    Ok(match fetch_question(conn, id)? {
        Some(q) => QuestionRef::Known(q),
        None => QuestionRef::Unknown(id.to_string()),
    })
}
