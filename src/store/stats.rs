use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::StoreResult;

use super::types::{MediaType, QuestionCategory};

/// Aggregate counts over the journal. Computed from plaintext columns only,
/// so it works while the store is locked.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_recordings: u64,
    pub transcribed_recordings: u64,
    pub by_media_type: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, u64>,
    pub journal_entries: u64,
    pub questions: u64,
    pub answered_questions: u64,
    pub pending_sync: u64,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_recording: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_recording: Option<String>,
}

/// Compute journal statistics.
///
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn journal_stats(conn: &Connection, db_path: Option<&Path>) -> StoreResult<StatsResponse> {
    let count = |sql: &str| -> rusqlite::Result<u64> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    };

    let (oldest, newest) = recording_time_range(conn)?;
    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_recordings: count("SELECT COUNT(*) FROM recordings")?,
        transcribed_recordings: count(
            "SELECT COUNT(*) FROM recordings WHERE transcript_ciphertext IS NOT NULL",
        )?,
        by_media_type: count_by_media_type(conn)?,
        by_category: count_by_category(conn)?,
        journal_entries: count("SELECT COUNT(*) FROM journal_entries")?,
        questions: count("SELECT COUNT(*) FROM questions")?,
        answered_questions: count(
            "SELECT COUNT(DISTINCT r.question_id) FROM recordings r \
             JOIN questions q ON q.id = r.question_id",
        )?,
        pending_sync: count("SELECT COUNT(*) FROM sync_outbox")?,
        db_size_bytes,
        oldest_recording: oldest,
        newest_recording: newest,
    })
}

fn count_by_media_type(conn: &Connection) -> rusqlite::Result<BTreeMap<String, u64>> {
    let mut map: BTreeMap<String, u64> = MediaType::ALL
        .iter()
        .map(|m| (m.as_str().to_string(), 0))
        .collect();

    let mut stmt = conn.prepare("SELECT media_type, COUNT(*) FROM recordings GROUP BY media_type")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (media, n) in rows {
        map.insert(media, n as u64);
    }
    Ok(map)
}

/// Recordings per category of the question they answer. Unlinked or dangling
/// recordings are not counted.
fn count_by_category(conn: &Connection) -> rusqlite::Result<BTreeMap<String, u64>> {
    let mut map: BTreeMap<String, u64> = QuestionCategory::ALL
        .iter()
        .map(|c| (c.as_str().to_string(), 0))
        .collect();

    let mut stmt = conn.prepare(
        "SELECT q.category, COUNT(*) FROM recordings r \
         JOIN questions q ON q.id = r.question_id GROUP BY q.category",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (category, n) in rows {
        map.insert(category, n as u64);
    }
    Ok(map)
}

fn recording_time_range(conn: &Connection) -> rusqlite::Result<(Option<String>, Option<String>)> {
    conn.query_row(
        "SELECT MIN(created_at), MAX(created_at) FROM recordings",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}
