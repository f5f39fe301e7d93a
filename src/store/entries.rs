//! Journal entry persistence. Same shape as [`super::recordings`]; only the
//! body is sealed.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::crypto::{DerivedKey, EncryptedData};
use crate::db::{conversion_error, date_column, enum_column, format_timestamp, timestamp_column};
use crate::error::StoreResult;

use super::events::{ChangeKind, Table};
use super::outbox;
use super::tombstones;
use super::query::{limit_clause, EntryQuery};
use super::sealed::{self, sealed_column};
use super::types::{EntrySummary, JournalEntry, PrivacyLevel};

const SELECT_COLUMNS: &str =
    "id, entry_date, mood, tags, privacy, body_ciphertext, body_meta, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: String,
    pub entry_date: NaiveDate,
    pub mood: Option<String>,
    pub tags: Vec<String>,
    pub privacy: PrivacyLevel,
    pub body: EncryptedData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredEntry {
    pub fn seal(entry: &JournalEntry, key: &DerivedKey) -> StoreResult<Self> {
        Ok(Self {
            id: entry.id.clone(),
            entry_date: entry.entry_date,
            mood: entry.mood.clone(),
            tags: entry.tags.clone(),
            privacy: entry.privacy,
            body: sealed::seal("body", &entry.body, key)?,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        })
    }

    pub fn open(&self, key: &DerivedKey) -> StoreResult<JournalEntry> {
        Ok(JournalEntry {
            id: self.id.clone(),
            entry_date: self.entry_date,
            body: sealed::open("body", &self.body, key)?,
            mood: self.mood.clone(),
            tags: self.tags.clone(),
            privacy: self.privacy,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let tags: String = row.get(3)?;
        Ok(Self {
            id: row.get(0)?,
            entry_date: date_column(row, 1)?,
            mood: row.get(2)?,
            tags: serde_json::from_str(&tags).map_err(|e| conversion_error(3, e))?,
            privacy: enum_column(row, 4)?,
            body: sealed_column(row, 5, 6)?,
            created_at: timestamp_column(row, 7)?,
            updated_at: timestamp_column(row, 8)?,
        })
    }

    pub(crate) fn write(&self, conn: &Connection) -> StoreResult<()> {
        let (body_ct, body_meta) = sealed::to_columns(&self.body)?;
        conn.execute(
            "INSERT INTO journal_entries (id, entry_date, mood, tags, privacy, body_ciphertext, body_meta, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(id) DO UPDATE SET entry_date = excluded.entry_date, mood = excluded.mood, \
             tags = excluded.tags, privacy = excluded.privacy, body_ciphertext = excluded.body_ciphertext, \
             body_meta = excluded.body_meta, created_at = excluded.created_at, updated_at = excluded.updated_at",
            params![
                self.id,
                self.entry_date.format("%Y-%m-%d").to_string(),
                self.mood,
                serde_json::to_string(&self.tags)?,
                self.privacy.as_str(),
                body_ct,
                body_meta,
                format_timestamp(&self.created_at),
                format_timestamp(&self.updated_at),
            ],
        )?;
        Ok(())
    }

    fn write_and_enqueue(&self, conn: &mut Connection) -> StoreResult<()> {
        let payload = serde_json::to_value(self)?;
        let tx = conn.transaction()?;
        self.write(&tx)?;
        tombstones::clear(&tx, Table::JournalEntries, &self.id)?;
        outbox::enqueue(&tx, Table::JournalEntries, &self.id, ChangeKind::Put, Some(&payload))?;
        tx.commit()?;
        Ok(())
    }
}

pub fn upsert_entry(conn: &mut Connection, entry: &JournalEntry, key: &DerivedKey) -> StoreResult<()> {
    StoredEntry::seal(entry, key)?.write_and_enqueue(conn)
}

pub fn fetch_stored(conn: &Connection, id: &str) -> StoreResult<Option<StoredEntry>> {
    let stored = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM journal_entries WHERE id = ?1"),
            params![id],
            StoredEntry::from_row,
        )
        .optional()?;
    Ok(stored)
}

pub fn fetch_entry(conn: &Connection, id: &str, key: &DerivedKey) -> StoreResult<Option<JournalEntry>> {
    fetch_stored(conn, id)?.map(|s| s.open(key)).transpose()
}

/// Entries matching `query`, most recent date first.
pub fn query_entries(
    conn: &Connection,
    query: &EntryQuery,
    key: &DerivedKey,
) -> StoreResult<Vec<JournalEntry>> {
    let (where_clause, values) = query.where_clause();
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM journal_entries {where_clause} \
         ORDER BY entry_date DESC, created_at DESC{}",
        limit_clause(query.limit)
    );
    let mut stmt = conn.prepare(&sql)?;
    let stored: Vec<StoredEntry> = stmt
        .query_map(params_from_iter(values), StoredEntry::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    let (readable, foreign): (Vec<_>, Vec<_>) = stored
        .into_iter()
        .partition(|s| s.body.meta.kdf.salt == key.kdf().salt);
    if !foreign.is_empty() {
        tracing::warn!(skipped = foreign.len(), "journal entries sealed under another vault left out");
    }
    readable.iter().map(|s| s.open(key)).collect()
}

pub fn entry_summaries(conn: &Connection) -> StoreResult<Vec<EntrySummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, entry_date, mood, tags FROM journal_entries ORDER BY entry_date DESC, created_at DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let tags: String = row.get(3)?;
            Ok(EntrySummary {
                id: row.get(0)?,
                entry_date: date_column(row, 1)?,
                mood: row.get(2)?,
                tags: serde_json::from_str(&tags).map_err(|e| conversion_error(3, e))?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn entry_ids(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM journal_entries ORDER BY created_at, id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn delete_entry(conn: &mut Connection, id: &str) -> StoreResult<bool> {
    let tx = conn.transaction()?;
    let removed = tx.execute("DELETE FROM journal_entries WHERE id = ?1", params![id])?;
    if removed > 0 {
        tombstones::record(&tx, Table::JournalEntries, id, &Utc::now())?;
        outbox::enqueue(&tx, Table::JournalEntries, id, ChangeKind::Delete, None)?;
    }
    tx.commit()?;
    Ok(removed > 0)
}

pub fn reencrypt_entry(
    conn: &mut Connection,
    id: &str,
    old_key: &DerivedKey,
    new_key: &DerivedKey,
) -> StoreResult<bool> {
    let Some(stored) = fetch_stored(conn, id)? else {
        return Ok(false);
    };
    if stored.body.meta.kdf == *new_key.kdf() {
        return Ok(false);
    }
    let entry = stored.open(old_key)?;
    StoredEntry::seal(&entry, new_key)?.write_and_enqueue(conn)?;
    Ok(true)
}
