//! Recording persistence: seal → upsert → outbox, inside one transaction.
//!
//! Functions here are synchronous and take a `Connection`; [`super::LocalStore`]
//! runs them on the blocking pool and publishes change events after commit.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::crypto::{DerivedKey, EncryptedData};
use crate::db::{enum_column, format_timestamp, timestamp_column};
use crate::error::{StoreError, StoreResult};

use super::events::{ChangeKind, Table};
use super::outbox;
use super::tombstones;
use super::query::{limit_clause, RecordingQuery};
use super::sealed::{self, optional_sealed_column, sealed_column};
use super::types::{MediaType, PrivacyLevel, QuestionCategory, Recording, RecordingSummary};
use super::validate::Validate;

const SELECT_COLUMNS: &str = "id, question_id, media_type, privacy, content_ciphertext, \
     content_meta, transcript_ciphertext, transcript_meta, duration_secs, created_at, updated_at";

/// A recording as it sits on disk: sensitive fields sealed. Also the sync payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecording {
    pub id: String,
    pub question_id: Option<String>,
    pub media_type: MediaType,
    pub privacy: PrivacyLevel,
    pub content: EncryptedData,
    pub transcription: Option<EncryptedData>,
    pub duration_secs: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecording {
    pub fn seal(recording: &Recording, key: &DerivedKey) -> StoreResult<Self> {
        let transcription = recording
            .transcription
            .as_deref()
            .map(|t| sealed::seal("transcription", t, key))
            .transpose()?;
        Ok(Self {
            id: recording.id.clone(),
            question_id: recording.question_id.clone(),
            media_type: recording.media_type,
            privacy: recording.privacy,
            content: sealed::seal("content", &recording.content, key)?,
            transcription,
            duration_secs: recording.duration_secs,
            created_at: recording.created_at,
            updated_at: recording.updated_at,
        })
    }

    pub fn open(&self, key: &DerivedKey) -> StoreResult<Recording> {
        let transcription = self
            .transcription
            .as_ref()
            .map(|t| sealed::open("transcription", t, key))
            .transpose()?;
        Ok(Recording {
            id: self.id.clone(),
            question_id: self.question_id.clone(),
            media_type: self.media_type,
            content: sealed::open("content", &self.content, key)?,
            transcription,
            duration_secs: self.duration_secs,
            privacy: self.privacy,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    /// Whether every sealed field uses `key`'s KDF parameters.
    pub fn sealed_under(&self, key: &DerivedKey) -> bool {
        let salt = &key.kdf().salt;
        self.content.meta.kdf.salt == *salt
            && self
                .transcription
                .as_ref()
                .map_or(true, |t| t.meta.kdf.salt == *salt)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            question_id: row.get(1)?,
            media_type: enum_column(row, 2)?,
            privacy: enum_column(row, 3)?,
            content: sealed_column(row, 4, 5)?,
            transcription: optional_sealed_column(row, 6, 7)?,
            duration_secs: row.get(8)?,
            created_at: timestamp_column(row, 9)?,
            updated_at: timestamp_column(row, 10)?,
        })
    }

    /// Insert or replace the row. Does not touch the outbox.
    pub(crate) fn write(&self, conn: &Connection) -> StoreResult<()> {
        let (content_ct, content_meta) = sealed::to_columns(&self.content)?;
        let (transcript_ct, transcript_meta) =
            sealed::to_optional_columns(self.transcription.as_ref())?;
        conn.execute(
            "INSERT INTO recordings (id, question_id, media_type, privacy, content_ciphertext, content_meta, \
             transcript_ciphertext, transcript_meta, duration_secs, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT(id) DO UPDATE SET question_id = excluded.question_id, media_type = excluded.media_type, \
             privacy = excluded.privacy, content_ciphertext = excluded.content_ciphertext, \
             content_meta = excluded.content_meta, transcript_ciphertext = excluded.transcript_ciphertext, \
             transcript_meta = excluded.transcript_meta, duration_secs = excluded.duration_secs, \
             created_at = excluded.created_at, updated_at = excluded.updated_at",
            params![
                self.id,
                self.question_id,
                self.media_type.as_str(),
                self.privacy.as_str(),
                content_ct,
                content_meta,
                transcript_ct,
                transcript_meta,
                self.duration_secs,
                format_timestamp(&self.created_at),
                format_timestamp(&self.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Write the row and queue it for sync, atomically.
    fn write_and_enqueue(&self, conn: &mut Connection) -> StoreResult<()> {
        let payload = serde_json::to_value(self)?;
        let tx = conn.transaction()?;
        self.write(&tx)?;
        tombstones::clear(&tx, Table::Recordings, &self.id)?;
        outbox::enqueue(&tx, Table::Recordings, &self.id, ChangeKind::Put, Some(&payload))?;
        tx.commit()?;
        Ok(())
    }
}

/// Encrypt and upsert a recording, queueing it for sync.
pub fn upsert_recording(
    conn: &mut Connection,
    recording: &Recording,
    key: &DerivedKey,
) -> StoreResult<()> {
    StoredRecording::seal(recording, key)?.write_and_enqueue(conn)
}

/// Raw sealed row, without decrypting.
pub fn fetch_stored(conn: &Connection, id: &str) -> StoreResult<Option<StoredRecording>> {
    let stored = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM recordings WHERE id = ?1"),
            params![id],
            StoredRecording::from_row,
        )
        .optional()?;
    Ok(stored)
}

pub fn fetch_recording(
    conn: &Connection,
    id: &str,
    key: &DerivedKey,
) -> StoreResult<Option<Recording>> {
    fetch_stored(conn, id)?.map(|s| s.open(key)).transpose()
}

/// Recordings matching `query`, newest first.
pub fn query_recordings(
    conn: &Connection,
    query: &RecordingQuery,
    key: &DerivedKey,
) -> StoreResult<Vec<Recording>> {
    let (where_clause, values) = query.where_clause();
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM recordings {where_clause} ORDER BY created_at DESC, id{}",
        limit_clause(query.limit)
    );
    let mut stmt = conn.prepare(&sql)?;
    let stored: Vec<StoredRecording> = stmt
        .query_map(params_from_iter(values), StoredRecording::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    let (readable, foreign): (Vec<_>, Vec<_>) =
        stored.into_iter().partition(|s| s.sealed_under(key));
    if !foreign.is_empty() {
        tracing::warn!(skipped = foreign.len(), "recordings sealed under another vault left out");
    }
    readable.iter().map(|s| s.open(key)).collect()
}

/// Plaintext-only listing, newest first, with each question's category resolved.
pub fn recording_summaries(conn: &Connection) -> StoreResult<Vec<RecordingSummary>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.question_id, q.category, r.media_type, r.privacy, \
         r.transcript_ciphertext IS NOT NULL, r.created_at \
         FROM recordings r LEFT JOIN questions q ON q.id = r.question_id \
         ORDER BY r.created_at DESC, r.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let category: Option<String> = row.get(2)?;
            Ok(RecordingSummary {
                id: row.get(0)?,
                question_id: row.get(1)?,
                category: category.and_then(|c| c.parse::<QuestionCategory>().ok()),
                media_type: enum_column(row, 3)?,
                privacy: enum_column(row, 4)?,
                has_transcription: row.get(5)?,
                created_at: timestamp_column(row, 6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn recording_ids(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM recordings ORDER BY created_at, id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Delete a recording. Returns `false` (and changes nothing) if it did not exist.
pub fn delete_recording(conn: &mut Connection, id: &str) -> StoreResult<bool> {
    let tx = conn.transaction()?;
    let removed = tx.execute("DELETE FROM recordings WHERE id = ?1", params![id])?;
    if removed > 0 {
        tombstones::record(&tx, Table::Recordings, id, &Utc::now())?;
        outbox::enqueue(&tx, Table::Recordings, id, ChangeKind::Delete, None)?;
    }
    tx.commit()?;
    Ok(removed > 0)
}

/// Attach (or replace) the transcription of an existing recording.
pub fn attach_transcription(
    conn: &mut Connection,
    id: &str,
    text: &str,
    key: &DerivedKey,
) -> StoreResult<Recording> {
    let stored =
        fetch_stored(conn, id)?.ok_or_else(|| StoreError::not_found("recording", id))?;
    let mut recording = stored.open(key)?;
    recording.transcription = Some(text.to_string());
    recording.updated_at = Utc::now().max(recording.created_at);
    recording.validate()?;

    let mut updated = stored;
    updated.transcription = Some(sealed::seal("transcription", text, key)?);
    updated.updated_at = recording.updated_at;
    updated.write_and_enqueue(conn)?;
    Ok(recording)
}

/// Re-seal a recording sealed under `old_key` with `new_key`.
///
/// Returns `false` if the recording is missing or already sealed with `new_key`.
pub fn reencrypt_recording(
    conn: &mut Connection,
    id: &str,
    old_key: &DerivedKey,
    new_key: &DerivedKey,
) -> StoreResult<bool> {
    let Some(stored) = fetch_stored(conn, id)? else {
        return Ok(false);
    };
    if stored.content.meta.kdf == *new_key.kdf() {
        return Ok(false);
    }
    let recording = stored.open(old_key)?;
    StoredRecording::seal(&recording, new_key)?.write_and_enqueue(conn)?;
    Ok(true)
}
