//! The singleton settings row.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{format_timestamp, timestamp_column};
use crate::error::StoreResult;

use super::events::{ChangeKind, Table};
use super::outbox;
use super::types::{UserSettings, DEFAULT_SETTINGS};

/// Entity id used for the settings row in the outbox and change events.
pub const SETTINGS_ID: &str = "settings";

/// Current settings. The defaults are written on first access.
pub fn load_settings(conn: &Connection) -> StoreResult<UserSettings> {
    let stored: Option<String> = conn
        .query_row("SELECT settings FROM user_settings WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    match stored {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => {
            conn.execute(
                "INSERT OR IGNORE INTO user_settings (id, settings, updated_at) VALUES (1, ?1, ?2)",
                params![
                    serde_json::to_string(&DEFAULT_SETTINGS)?,
                    format_timestamp(&Utc::now())
                ],
            )?;
            tracing::debug!("wrote default settings");
            Ok(DEFAULT_SETTINGS)
        }
    }
}

/// Replace the settings row and queue it for sync.
pub fn save_settings(conn: &mut Connection, settings: &UserSettings) -> StoreResult<()> {
    let payload = serde_json::to_value(settings)?;
    let tx = conn.transaction()?;
    write_settings(&tx, settings, &Utc::now())?;
    outbox::enqueue(&tx, Table::UserSettings, SETTINGS_ID, ChangeKind::Put, Some(&payload))?;
    tx.commit()?;
    Ok(())
}

/// Replace the settings row without touching the outbox.
pub(crate) fn write_settings(
    conn: &Connection,
    settings: &UserSettings,
    updated_at: &DateTime<Utc>,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO user_settings (id, settings, updated_at) VALUES (1, ?1, ?2) \
         ON CONFLICT(id) DO UPDATE SET settings = excluded.settings, updated_at = excluded.updated_at",
        params![serde_json::to_string(settings)?, format_timestamp(updated_at)],
    )?;
    Ok(())
}

pub(crate) fn settings_updated_at(conn: &Connection) -> StoreResult<Option<DateTime<Utc>>> {
    let ts = conn
        .query_row("SELECT updated_at FROM user_settings WHERE id = 1", [], |row| {
            timestamp_column(row, 0)
        })
        .optional()?;
    Ok(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{PrivacyLevel, Setting};

    #[test]
    fn first_load_writes_defaults() {
        let conn = crate::db::open_memory_database().unwrap();
        assert_eq!(load_settings(&conn).unwrap(), DEFAULT_SETTINGS);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_settings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn save_persists_and_enqueues() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let next = load_settings(&conn)
            .unwrap()
            .with(&Setting::DefaultPrivacy(PrivacyLevel::Family));
        save_settings(&mut conn, &next).unwrap();

        assert_eq!(load_settings(&conn).unwrap().default_privacy, PrivacyLevel::Family);
        let pending = outbox::pending(&conn, 10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].table, Table::UserSettings);
        assert_eq!(pending[0].entity_id, SETTINGS_ID);
    }
}
