//! Delete markers for last-writer-wins.
//!
//! A delete leaves no row behind, so without a marker any older remote put
//! would look new. Each delete records when it happened; a later local put of
//! the same id clears it again.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{format_timestamp, timestamp_column};
use crate::error::StoreResult;

use super::events::Table;

/// Record a delete. An existing marker only moves forward in time.
pub(crate) fn record(conn: &Connection, table: Table, id: &str, at: &DateTime<Utc>) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO tombstones (entity_table, entity_id, deleted_at) VALUES (?1, ?2, ?3) \
         ON CONFLICT(entity_table, entity_id) DO UPDATE SET deleted_at = excluded.deleted_at \
         WHERE excluded.deleted_at > tombstones.deleted_at",
        params![table.as_str(), id, format_timestamp(at)],
    )?;
    Ok(())
}

pub(crate) fn clear(conn: &Connection, table: Table, id: &str) -> StoreResult<()> {
    conn.execute(
        "DELETE FROM tombstones WHERE entity_table = ?1 AND entity_id = ?2",
        params![table.as_str(), id],
    )?;
    Ok(())
}

pub(crate) fn deleted_at(conn: &Connection, table: Table, id: &str) -> StoreResult<Option<DateTime<Utc>>> {
    let ts = conn
        .query_row(
            "SELECT deleted_at FROM tombstones WHERE entity_table = ?1 AND entity_id = ?2",
            params![table.as_str(), id],
            |row| timestamp_column(row, 0),
        )
        .optional()?;
    Ok(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn markers_only_move_forward() {
        let conn = crate::db::open_memory_database().unwrap();
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        record(&conn, Table::Recordings, "r1", &late).unwrap();
        record(&conn, Table::Recordings, "r1", &early).unwrap();
        assert_eq!(deleted_at(&conn, Table::Recordings, "r1").unwrap(), Some(late));
        assert!(deleted_at(&conn, Table::JournalEntries, "r1").unwrap().is_none());

        clear(&conn, Table::Recordings, "r1").unwrap();
        assert!(deleted_at(&conn, Table::Recordings, "r1").unwrap().is_none());
    }
}
