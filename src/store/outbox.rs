//! Pending local changes for the sync backend.
//!
//! Every local put/delete appends a row in the same transaction as the write.
//! Payloads are the sealed on-disk form, so plaintext never leaves the device.

use rusqlite::{params, Connection};

use crate::db::conversion_error;
use crate::error::StoreResult;
use crate::sync::SyncMutation;

use super::events::{ChangeKind, Table};

pub(crate) fn enqueue(
    conn: &Connection,
    table: Table,
    id: &str,
    kind: ChangeKind,
    payload: Option<&serde_json::Value>,
) -> StoreResult<()> {
    let now = crate::db::format_timestamp(&chrono::Utc::now());
    let payload_json = payload.map(|p| p.to_string());
    conn.execute(
        "INSERT INTO sync_outbox (entity_table, entity_id, operation, payload, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![table.as_str(), id, kind.as_str(), payload_json, now],
    )?;
    Ok(())
}

/// Oldest pending mutations, up to `limit`.
pub fn pending(conn: &Connection, limit: usize) -> StoreResult<Vec<SyncMutation>> {
    let mut stmt = conn.prepare(
        "SELECT seq, entity_table, entity_id, operation, payload, created_at \
         FROM sync_outbox ORDER BY seq LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            let table: String = row.get(1)?;
            let op: String = row.get(3)?;
            let payload: Option<String> = row.get(4)?;
            let invalid = |idx: usize, msg: String| {
                conversion_error(idx, std::io::Error::new(std::io::ErrorKind::InvalidData, msg))
            };
            Ok(SyncMutation {
                seq: row.get(0)?,
                table: table.parse().map_err(|e| invalid(1, e))?,
                entity_id: row.get(2)?,
                operation: op.parse().map_err(|e| invalid(3, e))?,
                payload: payload
                    .map(|p| serde_json::from_str(&p))
                    .transpose()
                    .map_err(|e| conversion_error(4, e))?,
                created_at: crate::db::timestamp_column(row, 5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Drop every mutation up to and including `seq` once the backend accepted them.
pub fn acknowledge(conn: &Connection, seq: i64) -> StoreResult<usize> {
    Ok(conn.execute("DELETE FROM sync_outbox WHERE seq <= ?1", params![seq])?)
}

pub fn pending_count(conn: &Connection) -> StoreResult<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM sync_outbox", [], |row| row.get(0))?;
    Ok(n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_pending_acknowledge() {
        let conn = crate::db::open_memory_database().unwrap();
        let payload = serde_json::json!({"id": "r1"});
        enqueue(&conn, Table::Recordings, "r1", ChangeKind::Put, Some(&payload)).unwrap();
        enqueue(&conn, Table::Recordings, "r1", ChangeKind::Delete, None).unwrap();

        let pending = pending(&conn, 10).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].operation, ChangeKind::Put);
        assert_eq!(pending[0].payload.as_ref(), Some(&payload));
        assert_eq!(pending[1].operation, ChangeKind::Delete);
        assert!(pending[1].payload.is_none());

        acknowledge(&conn, pending[0].seq).unwrap();
        assert_eq!(pending_count(&conn).unwrap(), 1);
    }
}
