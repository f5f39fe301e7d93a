//! Applying changes pulled from the sync backend.
//!
//! Remote rows arrive already sealed and are written as-is: no key is needed
//! and nothing is re-queued in the outbox. Conflicts resolve last-writer-wins
//! on `updated_at`; on a tie the local side is kept. A local delete counts as
//! a write at its tombstone time.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::timestamp_column;
use crate::error::StoreResult;
use crate::sync::{RemoteChange, SyncError};

use super::entries::StoredEntry;
use super::events::{ChangeKind, Table};
use super::recordings::StoredRecording;
use super::settings;
use super::tombstones;
use super::types::UserSettings;

/// Apply one remote change. Returns `true` if local state changed.
pub(crate) fn apply_remote(conn: &mut Connection, change: &RemoteChange) -> StoreResult<bool> {
    match (change.table, change.operation) {
        (Table::Recordings, ChangeKind::Put) => {
            let incoming: StoredRecording = decode(change)?;
            let tx = conn.transaction()?;
            if !is_newer(last_local_write(&tx, Table::Recordings, &incoming.id)?, &incoming.updated_at) {
                return Ok(false);
            }
            incoming.write(&tx)?;
            tombstones::clear(&tx, Table::Recordings, &incoming.id)?;
            tx.commit()?;
            Ok(true)
        }
        (Table::JournalEntries, ChangeKind::Put) => {
            let incoming: StoredEntry = decode(change)?;
            let tx = conn.transaction()?;
            if !is_newer(last_local_write(&tx, Table::JournalEntries, &incoming.id)?, &incoming.updated_at) {
                return Ok(false);
            }
            incoming.write(&tx)?;
            tombstones::clear(&tx, Table::JournalEntries, &incoming.id)?;
            tx.commit()?;
            Ok(true)
        }
        (Table::UserSettings, ChangeKind::Put) => {
            let incoming: UserSettings = decode(change)?;
            let tx = conn.transaction()?;
            if !is_newer(settings::settings_updated_at(&tx)?, &change.updated_at) {
                return Ok(false);
            }
            settings::write_settings(&tx, &incoming, &change.updated_at)?;
            tx.commit()?;
            Ok(true)
        }
        (table @ (Table::Recordings | Table::JournalEntries), ChangeKind::Delete) => {
            let tx = conn.transaction()?;
            let removed = match local_updated_at(&tx, table, &change.entity_id)? {
                Some(local) if local >= change.updated_at => return Ok(false),
                Some(_) => {
                    tx.execute(
                        &format!("DELETE FROM {table} WHERE id = ?1"),
                        params![change.entity_id],
                    )?;
                    true
                }
                None => false,
            };
            // Remembered even without a local row, so a put that arrives
            // later but is older stays dead.
            tombstones::record(&tx, table, &change.entity_id, &change.updated_at)?;
            tx.commit()?;
            Ok(removed)
        }
        (table, operation) => {
            tracing::warn!(table = %table, operation = operation.as_str(), id = %change.entity_id, "ignoring unsupported remote change");
            Ok(false)
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(change: &RemoteChange) -> StoreResult<T> {
    let payload = change.payload.clone().ok_or_else(|| {
        SyncError::Payload(format!("{} {} put without payload", change.table, change.entity_id))
    })?;
    serde_json::from_value(payload).map_err(|e| {
        SyncError::Payload(format!("{} {}: {e}", change.table, change.entity_id)).into()
    })
}

fn local_updated_at(conn: &Connection, table: Table, id: &str) -> StoreResult<Option<DateTime<Utc>>> {
    let ts = conn
        .query_row(
            &format!("SELECT updated_at FROM {table} WHERE id = ?1"),
            params![id],
            |row| timestamp_column(row, 0),
        )
        .optional()?;
    Ok(ts)
}

/// The newer of the row's `updated_at` and its tombstone.
fn last_local_write(conn: &Connection, table: Table, id: &str) -> StoreResult<Option<DateTime<Utc>>> {
    let row = local_updated_at(conn, table, id)?;
    let deleted = tombstones::deleted_at(conn, table, id)?;
    Ok(row.max(deleted))
}

fn is_newer(local: Option<DateTime<Utc>>, incoming: &DateTime<Utc>) -> bool {
    local.map_or(true, |local| *incoming > local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_keep_the_local_row() {
        let now = Utc::now();
        assert!(is_newer(None, &now));
        assert!(!is_newer(Some(now), &now));
        assert!(is_newer(Some(now - chrono::Duration::seconds(1)), &now));
    }

    #[test]
    fn put_without_payload_is_rejected() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let change = RemoteChange {
            table: Table::Recordings,
            entity_id: "r1".into(),
            operation: ChangeKind::Put,
            payload: None,
            updated_at: Utc::now(),
        };
        let err = apply_remote(&mut conn, &change).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Sync);
    }

    #[test]
    fn delete_of_missing_row_changes_nothing() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let change = RemoteChange {
            table: Table::JournalEntries,
            entity_id: "nope".into(),
            operation: ChangeKind::Delete,
            payload: None,
            updated_at: Utc::now(),
        };
        assert!(!apply_remote(&mut conn, &change).unwrap());
        assert_eq!(
            tombstones::deleted_at(&conn, Table::JournalEntries, "nope").unwrap(),
            Some(change.updated_at)
        );
    }
}
