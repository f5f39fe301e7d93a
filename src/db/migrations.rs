//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`].

use rusqlite::{Connection, OptionalExtension};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// `schema_meta` key holding the vault's Argon2id parameters (JSON `KdfParams`).
pub const KDF_PARAMS_KEY: &str = "kdf_params";
/// `schema_meta` key holding a sealed canary used to verify the passphrase on unlock.
pub const KEY_CHECK_KEY: &str = "key_check";
/// `schema_meta` key holding when the vault parameters were last replaced.
pub const VAULT_UPDATED_AT_KEY: &str = "vault_updated_at";
/// `schema_meta` key holding the replaced vault (JSON `VaultParams`) while rows
/// sealed under it still wait for re-encryption.
pub const PREVIOUS_VAULT_KEY: &str = "previous_vault";
/// `schema_meta` key holding the last pull cursor returned by the sync backend.
pub const SYNC_CURSOR_KEY: &str = "sync_cursor";
/// `schema_meta` key holding the timestamp of the last completed sync.
pub const LAST_SYNC_KEY: &str = "last_sync_at";

/// Get the current schema version from the database.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

/// Update the stored schema version.
fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// Read an arbitrary `schema_meta` value.
pub fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = ?1",
        [key],
        |row| row.get::<_, String>(0),
    )
    .optional()
}

/// Insert or replace a `schema_meta` value.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Remove a `schema_meta` value. Missing keys are fine.
pub fn delete_meta(conn: &Connection, key: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM schema_meta WHERE key = ?1", [key])?;
    Ok(())
}

/// Get the cipher suite recorded for this database, if any.
pub fn get_cipher_suite(conn: &Connection) -> rusqlite::Result<Option<String>> {
    get_meta(conn, "cipher_suite")
}

/// Run any pending forward-only migrations. Each migration runs in a transaction.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.transaction()?;
        match next {
            2 => migrate_v1_to_v2(&tx)?,
            3 => migrate_v2_to_v3(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }
        update_schema_version(&tx, next)?;
        tx.commit()?;
        version = next;
    }

    Ok(())
}

/// Migration v1 → v2: record the cipher suite and index the outbox by entity.
fn migrate_v1_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('cipher_suite', 'aes-256-gcm+argon2id')",
        [],
    )?;
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_outbox_entity ON sync_outbox(entity_table, entity_id);",
    )?;
    Ok(())
}

/// Migration v2 → v3: remember when rows were deleted, so a stale remote put
/// cannot bring them back.
fn migrate_v2_to_v3(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tombstones (
            entity_table TEXT NOT NULL CHECK(entity_table IN ('recordings','journal_entries')),
            entity_id TEXT NOT NULL,
            deleted_at TEXT NOT NULL,
            PRIMARY KEY (entity_table, entity_id)
        );",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn get_schema_version_returns_1_on_fresh_db() {
        let conn = test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn run_migrations_upgrades_to_current() {
        let mut conn = test_db();
        run_migrations(&mut conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn migration_v1_to_v2_records_cipher_suite() {
        let mut conn = test_db();
        assert!(get_cipher_suite(&conn).unwrap().is_none());

        run_migrations(&mut conn).unwrap();

        assert_eq!(
            get_cipher_suite(&conn).unwrap(),
            Some("aes-256-gcm+argon2id".to_string())
        );
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = test_db();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap(); // second call should not error
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn migration_v2_to_v3_adds_tombstones() {
        let mut conn = test_db();
        run_migrations(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO tombstones (entity_table, entity_id, deleted_at) VALUES ('recordings', 'r1', 'x')",
            [],
        )
        .unwrap();
        let bad = conn.execute(
            "INSERT INTO tombstones (entity_table, entity_id, deleted_at) VALUES ('questions', 'q1', 'x')",
            [],
        );
        assert!(bad.is_err());
    }

    #[test]
    fn set_and_get_meta() {
        let conn = test_db();
        assert!(get_meta(&conn, SYNC_CURSOR_KEY).unwrap().is_none());

        set_meta(&conn, SYNC_CURSOR_KEY, "c-42").unwrap();
        set_meta(&conn, SYNC_CURSOR_KEY, "c-43").unwrap();
        assert_eq!(
            get_meta(&conn, SYNC_CURSOR_KEY).unwrap(),
            Some("c-43".to_string())
        );

        delete_meta(&conn, SYNC_CURSOR_KEY).unwrap();
        assert!(get_meta(&conn, SYNC_CURSOR_KEY).unwrap().is_none());
    }
}
