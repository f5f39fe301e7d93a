//! SQL DDL for all lifelog tables.
//!
//! Defines `questions`, `recordings`, `journal_entries`, `user_settings`,
//! `sync_outbox`, and `schema_meta`. Sensitive fields are stored as a
//! `*_ciphertext` column (base64) next to a `*_meta` column (JSON
//! `EncryptionMeta`). All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for lifelog's core tables.
const SCHEMA_SQL: &str = r#"
-- Question catalog (built-in + extended supplement)
CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL CHECK(category IN ('childhood','family','relationships','career','values','reflection','gratitude','dreams')),
    prompt TEXT NOT NULL,
    metadata TEXT,
    source TEXT NOT NULL DEFAULT 'builtin' CHECK(source IN ('builtin','extended'))
);

CREATE INDEX IF NOT EXISTS idx_questions_category ON questions(category);

-- Captured recordings. question_id is a weak reference: no foreign key.
CREATE TABLE IF NOT EXISTS recordings (
    id TEXT PRIMARY KEY,
    question_id TEXT,
    media_type TEXT NOT NULL CHECK(media_type IN ('text','voice','photo','video')),
    privacy TEXT NOT NULL CHECK(privacy IN ('private','trusted','family','public')),
    content_ciphertext TEXT NOT NULL,
    content_meta TEXT NOT NULL,
    transcript_ciphertext TEXT,
    transcript_meta TEXT,
    duration_secs REAL CHECK(duration_secs IS NULL OR duration_secs >= 0.0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_recordings_question ON recordings(question_id);
CREATE INDEX IF NOT EXISTS idx_recordings_media ON recordings(media_type);
CREATE INDEX IF NOT EXISTS idx_recordings_created ON recordings(created_at);

-- Free-form journal entries
CREATE TABLE IF NOT EXISTS journal_entries (
    id TEXT PRIMARY KEY,
    entry_date TEXT NOT NULL,
    mood TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    privacy TEXT NOT NULL CHECK(privacy IN ('private','trusted','family','public')),
    body_ciphertext TEXT NOT NULL,
    body_meta TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_date ON journal_entries(entry_date);

-- Singleton settings row
CREATE TABLE IF NOT EXISTS user_settings (
    id INTEGER PRIMARY KEY CHECK(id = 1),
    settings TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Local changes waiting to be pushed to the sync backend
CREATE TABLE IF NOT EXISTS sync_outbox (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_table TEXT NOT NULL CHECK(entity_table IN ('recordings','journal_entries','user_settings')),
    entity_id TEXT NOT NULL,
    operation TEXT NOT NULL CHECK(operation IN ('put','delete')),
    payload TEXT,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
